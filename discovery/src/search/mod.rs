//! Tool search.
//!
//! Two engines rank the same catalog: [`SearchEngine`] scores lexical overlap and
//! [`SemanticSearchEngine`] compares embeddings. Both sit behind [`SearchStrategy`]; the
//! configured `searchMode` picks one.

pub mod embedder;
pub mod fuzzy;
pub mod semantic;

use async_trait::async_trait;

pub use embedder::HttpEmbedder;
pub use fuzzy::SearchEngine;
pub use semantic::{cosine_similarity, search_text, Embedder, SemanticSearchEngine};

use crate::{
    error::DiscoveryResult,
    inventory::{SearchOptions, SearchResult},
};

/// Ranks indexed tools against a free-text query.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Results sorted by descending relevance, truncated to `options.limit` when non-zero.
    async fn search(&self, query: &str, options: &SearchOptions) -> DiscoveryResult<Vec<SearchResult>>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl SearchStrategy for SearchEngine {
    async fn search(&self, query: &str, options: &SearchOptions) -> DiscoveryResult<Vec<SearchResult>> {
        Ok(SearchEngine::search(self, query, options))
    }

    fn name(&self) -> &'static str {
        "fuzzy"
    }
}

#[async_trait]
impl SearchStrategy for SemanticSearchEngine {
    async fn search(&self, query: &str, options: &SearchOptions) -> DiscoveryResult<Vec<SearchResult>> {
        Ok(SemanticSearchEngine::search(self, query, options).await?)
    }

    fn name(&self) -> &'static str {
        "semantic"
    }
}
