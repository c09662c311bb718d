//! Lexical relevance search.
//!
//! Scores are additive and capped at 1.0. A server-name hit outweighs every other signal so
//! that naming a server surfaces all of its tools ahead of loosely related tools elsewhere.

use std::sync::Arc;

use crate::inventory::{SearchOptions, SearchResult, ToolMetadata};

// Server name
const SERVER_QUERY_MATCH: f64 = 5.0;
const SERVER_TOKEN_EXACT: f64 = 5.0;
const SERVER_TOKEN_PARTIAL: f64 = 3.0;

// Tool name and summary, whole query
const NAME_EXACT: f64 = 1.0;
const NAME_CONTAINS: f64 = 0.8;
const SUMMARY_CONTAINS: f64 = 0.6;

// Per query token
const NAME_TOKEN: f64 = 0.4;
const SUMMARY_TOKEN: f64 = 0.2;

// Per tag
const TAG_QUERY_MATCH: f64 = 0.3;
const TAG_TOKEN: f64 = 0.15;

/// Fuzzy multi-factor search over an indexed tool list.
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    tools: Arc<Vec<ToolMetadata>>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole index.
    pub fn index(&mut self, tools: Vec<ToolMetadata>) {
        self.tools = Arc::new(tools);
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Ranked hits for `query`, most relevant first. Tools scoring zero are omitted.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        let query = query.to_lowercase();
        let tokens: Vec<&str> = query.split_whitespace().collect();

        let mut results: Vec<SearchResult> = self
            .tools
            .iter()
            .filter(|tool| options.admits(tool))
            .filter_map(|tool| {
                let relevance = relevance(tool, &query, &tokens);
                (relevance > 0.0).then(|| SearchResult::from_tool(tool, relevance))
            })
            .collect();

        sort_and_limit(&mut results, options.limit);
        results
    }
}

/// Sort descending by relevance (stable for ties) and apply a non-zero limit.
pub(crate) fn sort_and_limit(results: &mut Vec<SearchResult>, limit: Option<usize>) {
    results.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    if let Some(limit) = limit.filter(|&l| l > 0) {
        results.truncate(limit);
    }
}

fn relevance(tool: &ToolMetadata, query: &str, tokens: &[&str]) -> f64 {
    let name = tool.name.to_lowercase();
    let summary = tool.summary.to_lowercase();
    let server = tool.server.to_lowercase();

    let mut score = 0.0;

    if query.contains(&server) || server.contains(query) {
        score += SERVER_QUERY_MATCH;
    }
    for &token in tokens {
        if server == token {
            score += SERVER_TOKEN_EXACT;
        } else if server.contains(token) || token.contains(&server) {
            score += SERVER_TOKEN_PARTIAL;
        }
    }

    if name == query {
        score += NAME_EXACT;
    } else if name.contains(query) {
        score += NAME_CONTAINS;
    }
    if summary.contains(query) {
        score += SUMMARY_CONTAINS;
    }

    for &token in tokens {
        if name.contains(token) {
            score += NAME_TOKEN;
        }
        if summary.contains(token) {
            score += SUMMARY_TOKEN;
        }
    }

    for tag in &tool.tags {
        let tag = tag.to_lowercase();
        if query.contains(&tag) || tag.contains(query) {
            score += TAG_QUERY_MATCH;
        }
        for &token in tokens {
            if tag.contains(token) {
                score += TAG_TOKEN;
            }
        }
    }

    f64::min(score, 1.0)
}
