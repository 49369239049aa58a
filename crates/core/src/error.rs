//! Error types for the ragchat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error enum; the top-level
//! [`Error`] carries them unmodified.

use thiserror::Error;

/// The top-level error type for a chat invocation.
#[derive(Debug, Error)]
pub enum Error {
    // --- Knowledge store failures (RetrievalFailure) ---
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] KnowledgeError),

    // --- Model provider failures (GenerationFailure) ---
    #[error("Generation failed: {0}")]
    Generation(#[from] ProviderError),

    // --- Caller errors ---
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    // --- Streaming consumer failures ---
    #[error("Token sink failed: {0}")]
    Sink(#[from] SinkError),

    #[error("Request cancelled by caller")]
    Cancelled,

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::MalformedRequest`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRequest(reason.into())
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error("Knowledge store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Knowledge store timed out: {0}")]
    Timeout(String),

    #[error("Datastore not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("Token consumer closed")]
    Closed,

    #[error("Token consumer failed: {0}")]
    Failed(String),
}
