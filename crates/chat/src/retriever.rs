//! Context retrieval and serialization.

use ragchat_core::error::KnowledgeError;
use ragchat_core::knowledge::{KnowledgeStore, RetrievedChunk, SearchQuery};
use tracing::debug;

/// Fetch up to `top_k` chunks for `query`.
///
/// Without a store there is nothing to retrieve and the result is empty.
/// Store failures propagate unchanged. Ranking is the store's.
pub async fn retrieve(
    store: Option<&dyn KnowledgeStore>,
    query: &str,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>, KnowledgeError> {
    let Some(store) = store else {
        return Ok(Vec::new());
    };

    let chunks = store.search(SearchQuery::new(query, top_k)).await?;
    debug!(backend = store.name(), top_k, chunks = chunks.len(), "Context retrieved");
    Ok(chunks)
}

/// Render chunks as the context block the model cites from.
///
/// Each chunk becomes `CHUNK: <text>\nSOURCE: <source>`, joined by a blank
/// line, in retrieval order.
pub fn serialize_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("CHUNK: {}\nSOURCE: {}", chunk.text, chunk.source))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CountingStore, FailingStore};

    #[test]
    fn serializes_in_retrieval_order() {
        let chunks = vec![
            RetrievedChunk::new("A", "s1", 0.9),
            RetrievedChunk::new("B", "s2", 0.5),
        ];
        assert_eq!(
            serialize_context(&chunks),
            "CHUNK: A\nSOURCE: s1\n\nCHUNK: B\nSOURCE: s2"
        );
    }

    #[test]
    fn lower_scores_first_are_not_resorted() {
        let chunks = vec![
            RetrievedChunk::new("low", "s1", 0.1),
            RetrievedChunk::new("high", "s2", 0.99),
        ];
        assert!(serialize_context(&chunks).starts_with("CHUNK: low"));
    }

    #[test]
    fn no_chunks_is_empty_context() {
        assert_eq!(serialize_context(&[]), "");
    }

    #[tokio::test]
    async fn no_store_returns_empty() {
        let chunks = retrieve(None, "anything", 5).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn passes_query_and_top_k_to_store() {
        let store = CountingStore::new(vec![RetrievedChunk::new("A", "s1", 0.9)]);
        let chunks = retrieve(Some(&store), "refund policy", 3).await.unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(store.calls(), 1);
        let query = store.last_query().unwrap();
        assert_eq!(query.text, "refund policy");
        assert_eq!(query.top_k, 3);
        assert!(query.tags.is_empty());
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = FailingStore::new(KnowledgeError::Timeout("slow index".into()));
        let err = retrieve(Some(&store), "q", 5).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::Timeout(_)));
    }
}
