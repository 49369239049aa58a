//! # ragchat chat pipeline
//!
//! Retrieval-augmented chat, one request at a time:
//!
//! - [`retriever`]: fetch chunks from a knowledge store and serialize them
//! - [`history`]: prior turns to model messages
//! - [`prompt`]: the CustomerSupport and Raw message layouts
//! - [`orchestrator`]: runs the pipeline, streaming and cancellation
//! - [`normalize`]: trims the model output into the answer

pub mod history;
pub mod normalize;
pub mod orchestrator;
pub mod prompt;
pub mod request;
pub mod retriever;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use orchestrator::ChatOrchestrator;
pub use request::{ChatDefaults, ChatRequest, ChatResponse};
pub use stream_event::ChatStreamEvent;
