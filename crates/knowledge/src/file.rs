//! File-based knowledge store: JSON-lines documents.
//!
//! Each line is a JSON-encoded [`Document`]:
//!
//! ```text
//! {"text":"Refunds are issued within 14 days.","source":"faq/refunds","tags":["billing"]}
//! ```
//!
//! Documents are loaded once and searched in memory.

use async_trait::async_trait;
use ragchat_core::error::KnowledgeError;
use ragchat_core::knowledge::{KnowledgeStore, RetrievedChunk, SearchQuery};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::in_memory::{Document, rank};

pub struct FileKnowledgeStore {
    path: PathBuf,
    documents: Vec<Document>,
}

impl FileKnowledgeStore {
    /// Load documents from a JSONL file.
    ///
    /// Blank lines are ignored and corrupt lines are skipped with a warning.
    /// A missing or unreadable file is a storage error.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, KnowledgeError> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            KnowledgeError::Storage(format!(
                "Failed to read datastore file {}: {e}",
                path.display()
            ))
        })?;

        let documents = parse_documents(&content);
        debug!(path = %path.display(), count = documents.len(), "File datastore loaded");
        Ok(Self { path, documents })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn parse_documents(content: &str) -> Vec<Document> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str::<Document>(line) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(line = idx + 1, error = %e, "Skipping corrupted datastore entry");
                None
            }
        })
        .collect()
}

#[async_trait]
impl KnowledgeStore for FileKnowledgeStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<RetrievedChunk>, KnowledgeError> {
        Ok(rank(&self.documents, &query))
    }
}
