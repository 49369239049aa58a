//! Chat-level streaming events.
//!
//! Outer surfaces (the gateway's SSE endpoint) forward these to clients:
//! - `chunk`: a token from the model
//! - `done`: the normalized final answer
//! - `error`: the request failed; no answer follows

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    Chunk { content: String },
    Done { answer: String },
    Error { message: String },
}

impl ChatStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
