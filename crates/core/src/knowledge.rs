//! KnowledgeStore trait: ranked chunk search over a datastore.
//!
//! The pipeline never embeds or indexes anything itself; it asks a store for
//! the `top_k` best chunks for a query and trusts the store's ranking.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;

/// A retrieved span of source text with its citation and relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// The chunk text
    pub text: String,

    /// Citation the model is asked to quote verbatim
    pub source: String,

    /// Similarity / relevance, higher is better
    #[serde(default)]
    pub score: f32,
}

impl RetrievedChunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            score,
        }
    }
}

/// A search against a knowledge store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The search text
    pub text: String,

    /// Maximum number of results
    pub top_k: usize,

    /// Filter by tags (empty = no filtering)
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            top_k,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// The core KnowledgeStore trait.
///
/// Implementations: in-memory, JSONL file, remote HTTP datastore.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "file", "http").
    fn name(&self) -> &str;

    /// Return at most `query.top_k` chunks, best first.
    async fn search(
        &self,
        query: SearchQuery,
    ) -> std::result::Result<Vec<RetrievedChunk>, KnowledgeError>;
}
