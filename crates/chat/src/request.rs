//! Chat request, response and defaults.

use ragchat_config::AppConfig;
use ragchat_core::error::{Error, Result};
use ragchat_core::knowledge::KnowledgeStore;
use ragchat_core::message::Turn;
use ragchat_core::sink::TokenSink;
use ragchat_core::strategy::PromptStrategy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One chat invocation. Built by the caller, consumed by the orchestrator.
///
/// ```ignore
/// let request = ChatRequest::new("How do refunds work?")
///     .with_store(store)
///     .with_history(history)
///     .with_sink(Arc::new(tx));
/// ```
#[derive(Clone)]
pub struct ChatRequest {
    pub query: String,
    pub store: Option<Arc<dyn KnowledgeStore>>,
    pub top_k: Option<usize>,
    pub prompt: Option<String>,
    pub strategy: Option<PromptStrategy>,
    pub temperature: Option<f32>,
    pub model: Option<String>,
    pub history: Vec<Turn>,
    pub sink: Option<Arc<dyn TokenSink>>,
    pub cancellation: Option<CancellationToken>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            store: None,
            top_k: None,
            prompt: None,
            strategy: None,
            temperature: None,
            model: None,
            history: Vec::new(),
            sink: None,
            cancellation: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn KnowledgeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_strategy(mut self, strategy: PromptStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    /// Stream tokens to `sink` as they are generated.
    pub fn with_sink(mut self, sink: Arc<dyn TokenSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Abort the request when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

impl std::fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRequest")
            .field("query_len", &self.query.len())
            .field("store", &self.store.as_ref().map(|s| s.name().to_string()))
            .field("top_k", &self.top_k)
            .field("has_prompt", &self.prompt.is_some())
            .field("strategy", &self.strategy)
            .field("temperature", &self.temperature)
            .field("model", &self.model)
            .field("history_len", &self.history.len())
            .field("streaming", &self.sink.is_some())
            .finish()
    }
}

/// The public result of a successful chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Whitespace-trimmed model output
    pub answer: String,
}

/// Values used when a request leaves a field unset.
#[derive(Debug, Clone)]
pub struct ChatDefaults {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub strategy: PromptStrategy,
    pub customer_support_top_k: usize,
    pub raw_top_k: usize,
    /// Persona for customer-support requests that carry no prompt
    pub customer_support_prompt: Option<String>,
    /// Template for raw requests that carry no prompt
    pub raw_prompt: Option<String>,
}

impl ChatDefaults {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: config.default_max_tokens,
            strategy: config.chat.default_strategy.parse()?,
            customer_support_top_k: config.chat.customer_support_top_k,
            raw_top_k: config.chat.raw_top_k,
            customer_support_prompt: config.chat.customer_support_prompt.clone(),
            raw_prompt: config.chat.raw_prompt.clone(),
        })
    }

    /// Chunks to retrieve for `strategy` when the request sets no topK.
    pub fn top_k_for(&self, strategy: PromptStrategy) -> usize {
        match strategy {
            PromptStrategy::CustomerSupport => self.customer_support_top_k,
            PromptStrategy::Raw => self.raw_top_k,
        }
    }

    /// Configured prompt for `strategy` when the request sets none.
    pub fn prompt_for(&self, strategy: PromptStrategy) -> Option<&str> {
        match strategy {
            PromptStrategy::CustomerSupport => self.customer_support_prompt.as_deref(),
            PromptStrategy::Raw => self.raw_prompt.as_deref(),
        }
    }
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo-0613".into(),
            temperature: 0.0,
            max_tokens: None,
            strategy: PromptStrategy::CustomerSupport,
            customer_support_top_k: 5,
            raw_top_k: 5,
            customer_support_prompt: None,
            raw_prompt: None,
        }
    }
}

/// A request with every default applied and every field checked.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
    pub strategy: PromptStrategy,
    pub top_k: usize,
    pub temperature: f32,
    pub model: String,
    pub prompt: Option<String>,
}

impl ChatDefaults {
    /// Apply defaults to `request` and reject malformed values.
    pub(crate) fn resolve(&self, request: &ChatRequest) -> Result<Resolved> {
        if request.query.trim().is_empty() {
            return Err(Error::malformed("query must not be empty"));
        }

        let strategy = request.strategy.unwrap_or(self.strategy);

        let top_k = request.top_k.unwrap_or_else(|| self.top_k_for(strategy));
        if top_k == 0 {
            return Err(Error::malformed("top_k must be a positive integer"));
        }

        let temperature = request.temperature.unwrap_or(self.temperature);
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(Error::malformed(format!(
                "temperature must be a non-negative number, got {temperature}"
            )));
        }

        let model = match request.model.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => self.model.clone(),
        };

        let prompt = request
            .prompt
            .clone()
            .or_else(|| self.prompt_for(strategy).map(str::to_string));
        if strategy == PromptStrategy::Raw && prompt.is_none() {
            return Err(Error::malformed("the raw strategy requires a prompt template"));
        }

        Ok(Resolved {
            strategy,
            top_k,
            temperature,
            model,
            prompt,
        })
    }
}
