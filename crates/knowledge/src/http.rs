//! Remote datastore client.
//!
//! Queries a datastore service over HTTP:
//! - `POST {url}/query` with `{"query", "topK", "filters": {"tags"}}`
//! - optional `Authorization: Bearer <key>`
//! - response `{"results": [{"text", "source", "score"}]}`
//!
//! Ranking is the remote store's; results are only truncated to `top_k`.

use async_trait::async_trait;
use ragchat_core::error::KnowledgeError;
use ragchat_core::knowledge::{KnowledgeStore, RetrievedChunk, SearchQuery};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpKnowledgeStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpKnowledgeStore {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self::with_timeout(base_url, api_key, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "HTTP client setup failed, falling back to a client without timeout");
                reqwest::Client::new()
            });

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    query: &'a str,
    top_k: usize,
    filters: QueryFilters<'a>,
}

#[derive(Serialize)]
struct QueryFilters<'a> {
    tags: &'a [String],
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<RetrievedChunk>,
}

fn transport_error(e: reqwest::Error) -> KnowledgeError {
    if e.is_timeout() {
        KnowledgeError::Timeout(e.to_string())
    } else {
        KnowledgeError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl KnowledgeStore for HttpKnowledgeStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<RetrievedChunk>, KnowledgeError> {
        let url = format!("{}/query", self.base_url);
        let body = QueryBody {
            query: &query.text,
            top_k: query.top_k,
            filters: QueryFilters { tags: &query.tags },
        };

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Datastore query rejected");
            return Err(KnowledgeError::QueryFailed(format!(
                "datastore returned {status}: {body}"
            )));
        }

        let parsed: QueryResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                KnowledgeError::Timeout(e.to_string())
            } else {
                KnowledgeError::QueryFailed(format!("invalid datastore response: {e}"))
            }
        })?;

        let mut results = parsed.results;
        results.truncate(query.top_k);
        debug!(count = results.len(), "Datastore query returned");
        Ok(results)
    }
}
