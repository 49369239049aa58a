//! In-memory knowledge store with keyword overlap scoring.

use async_trait::async_trait;
use ragchat_core::error::KnowledgeError;
use ragchat_core::knowledge::{KnowledgeStore, RetrievedChunk, SearchQuery};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A document the store can return as a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// An in-memory store holding documents in a Vec.
/// Useful for testing and small curated datastores.
pub struct InMemoryKnowledgeStore {
    documents: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::with_documents(Vec::new())
    }

    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self {
            documents: Arc::new(RwLock::new(documents)),
        }
    }

    pub async fn insert(&self, document: Document) {
        self.documents.write().await.push(document);
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased alphanumeric terms of `text`.
pub(crate) fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Rank `documents` against `query`.
///
/// Score is the fraction of distinct query terms present in the document.
/// Zero scores are dropped; ties keep insertion order.
pub(crate) fn rank(documents: &[Document], query: &SearchQuery) -> Vec<RetrievedChunk> {
    let query_terms = terms(&query.text);
    if query_terms.is_empty() || query.top_k == 0 {
        return Vec::new();
    }

    let mut results: Vec<RetrievedChunk> = documents
        .iter()
        .filter(|d| query.tags.is_empty() || query.tags.iter().any(|t| d.tags.contains(t)))
        .filter_map(|d| {
            let doc_terms = terms(&d.text);
            let hits = query_terms.iter().filter(|t| doc_terms.contains(*t)).count();
            if hits == 0 {
                return None;
            }
            let score = hits as f32 / query_terms.len() as f32;
            Some(RetrievedChunk::new(d.text.clone(), d.source.clone(), score))
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(query.top_k);
    results
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<RetrievedChunk>, KnowledgeError> {
        let documents = self.documents.read().await;
        Ok(rank(&documents, &query))
    }
}
