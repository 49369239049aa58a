//! Chat orchestrator: retrieval, prompt, generation, normalization.
//!
//! One request runs strictly in sequence:
//!
//! ```text
//! resolve defaults ─► retrieve ─► build prompt ─► provider ─► normalize ─► ChatResponse
//! ```
//!
//! With a sink, every token is delivered and awaited before the next one is
//! read from the provider. A failing sink or a cancelled request drops the
//! provider stream, which stops the provider's reader task.

use ragchat_core::error::{Error, Result};
use ragchat_core::provider::{Provider, ProviderRequest};
use ragchat_core::sink::TokenSink;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::normalize::normalize;
use crate::prompt::{self, PromptInput};
use crate::request::{ChatDefaults, ChatRequest, ChatResponse};
use crate::retriever;

/// Runs chat requests against one shared provider.
///
/// Holds no per-request state; a single instance serves concurrent requests.
pub struct ChatOrchestrator {
    provider: Arc<dyn Provider>,
    defaults: ChatDefaults,
}

impl ChatOrchestrator {
    pub fn new(provider: Arc<dyn Provider>, defaults: ChatDefaults) -> Self {
        Self { provider, defaults }
    }

    pub fn defaults(&self) -> &ChatDefaults {
        &self.defaults
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Check `request` the way [`chat`](Self::chat) does, without running it.
    pub fn validate(&self, request: &ChatRequest) -> Result<()> {
        self.defaults.resolve(request).map(|_| ())
    }

    /// Answer one request.
    ///
    /// Malformed requests fail before the store or provider is touched.
    /// Store and provider errors propagate unchanged; nothing is retried.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let resolved = self.defaults.resolve(&request)?;
        let cancel = request.cancellation.as_ref();

        info!(
            strategy = %resolved.strategy,
            top_k = resolved.top_k,
            model = %resolved.model,
            history = request.history.len(),
            streaming = request.sink.is_some(),
            "Chat request"
        );

        let chunks = until_cancelled(
            cancel,
            retriever::retrieve(request.store.as_deref(), &request.query, resolved.top_k),
        )
        .await?
        .inspect_err(|e| warn!(error = %e, "Retrieval failed"))?;
        let context = retriever::serialize_context(&chunks);

        let messages = prompt::build(
            resolved.strategy,
            &PromptInput {
                query: &request.query,
                context: &context,
                prompt_override: resolved.prompt.as_deref(),
                history: &request.history,
            },
        )?;
        debug!(
            chunks = chunks.len(),
            context_len = context.len(),
            messages = messages.len(),
            "Prompt built"
        );

        let provider_request = ProviderRequest {
            model: resolved.model,
            messages,
            temperature: resolved.temperature,
            max_tokens: self.defaults.max_tokens,
            stream: request.sink.is_some(),
        };

        let raw = match request.sink.as_deref() {
            Some(sink) => self.generate_streaming(provider_request, sink, cancel).await?,
            None => self.generate(provider_request, cancel).await?,
        };

        let answer = normalize(Some(&raw));
        info!(answer_len = answer.len(), "Chat complete");
        Ok(ChatResponse { answer })
    }

    async fn generate(
        &self,
        request: ProviderRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let response = until_cancelled(cancel, self.provider.complete(request))
            .await?
            .inspect_err(|e| warn!(provider = self.provider.name(), error = %e, "Generation failed"))?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Generation usage"
            );
        }
        Ok(response.message.content)
    }

    async fn generate_streaming(
        &self,
        request: ProviderRequest,
        sink: &dyn TokenSink,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let mut rx = until_cancelled(cancel, self.provider.stream(request))
            .await?
            .inspect_err(|e| warn!(provider = self.provider.name(), error = %e, "Generation failed"))?;

        let mut answer = String::new();
        let mut tokens = 0usize;

        // `rx` is dropped on every early return, which aborts the provider.
        while let Some(item) = until_cancelled(cancel, rx.recv()).await? {
            let chunk = item.inspect_err(|e| {
                warn!(provider = self.provider.name(), tokens, error = %e, "Stream failed")
            })?;

            if let Some(token) = chunk.content.as_deref().filter(|t| !t.is_empty()) {
                until_cancelled(cancel, sink.on_token(token))
                    .await?
                    .inspect_err(|e| warn!(tokens, error = %e, "Token sink failed"))?;
                answer.push_str(token);
                tokens += 1;
            }

            if chunk.done {
                if let Some(usage) = &chunk.usage {
                    debug!(completion_tokens = usage.completion_tokens, "Stream usage");
                }
                break;
            }
        }

        debug!(tokens, "Stream finished");
        Ok(answer)
    }
}

/// Run `fut` unless `cancel` fires first.
async fn until_cancelled<F: Future>(cancel: Option<&CancellationToken>, fut: F) -> Result<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Chat request cancelled");
                Err(Error::Cancelled)
            }
            output = fut => Ok(output),
        },
        None => Ok(fut.await),
    }
}
