//! Scripted collaborators for pipeline tests.

use async_trait::async_trait;
use ragchat_core::error::{KnowledgeError, ProviderError, SinkError};
use ragchat_core::knowledge::{KnowledgeStore, RetrievedChunk, SearchQuery};
use ragchat_core::message::Message;
use ragchat_core::provider::{
    Provider, ProviderRequest, ProviderResponse, StreamChunk, StreamReceiver, Usage,
};
use ragchat_core::sink::TokenSink;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A provider that replays a fixed token script.
///
/// `complete` returns the concatenated tokens; `stream` emits them one by
/// one over a capacity-1 channel and stops once the receiver is dropped.
pub struct ScriptedProvider {
    script: Vec<Result<String, ProviderError>>,
    requests: Mutex<Vec<ProviderRequest>>,
    emitted: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn tokens(tokens: &[&str]) -> Self {
        Self::new(tokens.iter().map(|t| Ok(t.to_string())).collect())
    }

    /// Emit `tokens`, then fail with `error`.
    pub fn failing_after(tokens: &[&str], error: ProviderError) -> Self {
        let mut script: Vec<_> = tokens.iter().map(|t| Ok(t.to_string())).collect();
        script.push(Err(error));
        Self::new(script)
    }

    fn new(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
            emitted: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Script items actually handed to the channel.
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }

    fn record(&self, request: &ProviderRequest) {
        self.requests.lock().unwrap().push(request.clone());
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.record(&request);
        let mut text = String::new();
        for item in &self.script {
            text.push_str(&item.clone()?);
        }
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: request.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<StreamReceiver, ProviderError> {
        self.record(&request);
        let (tx, rx) = mpsc::channel(1);
        let script = self.script.clone();
        let emitted = self.emitted.clone();

        tokio::spawn(async move {
            for item in script {
                let chunk = item.map(StreamChunk::token);
                if tx.send(chunk).await.is_err() {
                    return;
                }
                emitted.fetch_add(1, Ordering::SeqCst);
            }
            let _ = tx.send(Ok(StreamChunk::finished(None))).await;
        });

        Ok(rx)
    }
}

/// A provider whose every call fails.
pub struct FailingProvider {
    error: ProviderError,
    calls: AtomicUsize,
}

impl FailingProvider {
    pub fn new(error: ProviderError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    async fn stream(&self, _request: ProviderRequest) -> Result<StreamReceiver, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// A store that returns fixed chunks and records what it was asked.
pub struct CountingStore {
    chunks: Vec<RetrievedChunk>,
    queries: Mutex<Vec<SearchQuery>>,
}

impl CountingStore {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            chunks,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn last_query(&self) -> Option<SearchQuery> {
        self.queries.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl KnowledgeStore for CountingStore {
    fn name(&self) -> &str {
        "counting"
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<RetrievedChunk>, KnowledgeError> {
        let mut results = self.chunks.clone();
        results.truncate(query.top_k);
        self.queries.lock().unwrap().push(query);
        Ok(results)
    }
}

/// A store whose every search fails.
pub struct FailingStore {
    error: KnowledgeError,
}

impl FailingStore {
    pub fn new(error: KnowledgeError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl KnowledgeStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn search(&self, _query: SearchQuery) -> Result<Vec<RetrievedChunk>, KnowledgeError> {
        Err(self.error.clone())
    }
}

/// Collects tokens. Optionally fails on the n-th token (1-based) or cancels
/// a token after the first delivery.
#[derive(Default)]
pub struct RecordingSink {
    tokens: Mutex<Vec<String>>,
    fail_on: Option<usize>,
    cancel_after_first: Option<CancellationToken>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(n: usize) -> Self {
        Self {
            fail_on: Some(n),
            ..Self::default()
        }
    }

    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel_after_first: Some(token),
            ..Self::default()
        }
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenSink for RecordingSink {
    async fn on_token(&self, token: &str) -> Result<(), SinkError> {
        let delivered = {
            let mut tokens = self.tokens.lock().unwrap();
            if self.fail_on == Some(tokens.len() + 1) {
                return Err(SinkError::Failed("consumer went away".into()));
            }
            tokens.push(token.to_string());
            tokens.len()
        };
        if delivered == 1 {
            if let Some(cancel) = &self.cancel_after_first {
                cancel.cancel();
            }
        }
        Ok(())
    }
}
