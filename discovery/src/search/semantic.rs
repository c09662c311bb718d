//! Embedding-based search.
//!
//! Each tool is embedded once at index time from its server, name, summary, description and
//! tags. Queries are embedded on demand and ranked by cosine similarity.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::fuzzy::sort_and_limit;
use crate::{
    error::EmbeddingError,
    inventory::{SearchOptions, SearchResult, ToolMetadata},
};

/// Converts text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Load the model or verify the endpoint. Must succeed before [`embed`](Self::embed).
    async fn initialize(&self) -> Result<(), EmbeddingError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Semantic search over an indexed tool list.
pub struct SemanticSearchEngine {
    embedder: Arc<dyn Embedder>,
    tools: Vec<ToolMetadata>,
    embeddings: Vec<Vec<f32>>,
    initialized: bool,
}

impl SemanticSearchEngine {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            tools: Vec::new(),
            embeddings: Vec::new(),
            initialized: false,
        }
    }

    pub async fn initialize(&mut self) -> Result<(), EmbeddingError> {
        if self.initialized {
            return Ok(());
        }
        debug!("Initializing embedding model");
        self.embedder.initialize().await?;
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Embed and store every tool, replacing the previous index.
    ///
    /// On failure the previous index is kept.
    pub async fn index(&mut self, tools: Vec<ToolMetadata>) -> Result<(), EmbeddingError> {
        if !self.initialized {
            return Err(EmbeddingError::ModelNotInitialized);
        }
        debug!(count = tools.len(), "Indexing tools for semantic search");

        let texts: Vec<String> = tools.iter().map(search_text).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != tools.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                tools.len(),
                embeddings.len()
            )));
        }

        self.tools = tools;
        self.embeddings = embeddings;
        Ok(())
    }

    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, EmbeddingError> {
        if !self.initialized {
            return Err(EmbeddingError::ModelNotInitialized);
        }

        let query_embedding = self.embedder.embed(query).await?;

        let mut results = Vec::new();
        for (tool, embedding) in self.tools.iter().zip(&self.embeddings) {
            if !options.admits(tool) {
                continue;
            }
            let similarity = cosine_similarity(&query_embedding, embedding)?;
            let mut result = SearchResult::from_tool(tool, similarity.clamp(0.0, 1.0));
            result.input_schema = tool.input_schema.clone();
            results.push(result);
        }

        sort_and_limit(&mut results, options.limit);
        Ok(results)
    }
}

/// Text embedded for a tool.
pub fn search_text(tool: &ToolMetadata) -> String {
    let mut parts: Vec<&str> = vec![tool.server.as_str(), tool.name.as_str(), tool.summary.as_str()];
    if let Some(description) = tool.description.as_deref() {
        parts.push(description);
    }
    parts.extend(tool.tags.iter().map(String::as_str));
    parts.retain(|part| !part.is_empty());
    parts.join(" ")
}

/// `dot(a, b) / (|a| * |b|)`; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: b.len(),
            actual: a.len(),
        });
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / denominator)
}
