//! # ragchat core
//!
//! Domain types, traits, and error definitions for the ragchat
//! retrieval-augmented chat pipeline. This crate has **zero framework
//! dependencies**: it defines the domain model every other crate builds on.
//!
//! ## Seams
//!
//! The two external collaborators of the pipeline are traits here:
//! - [`KnowledgeStore`]: ranked chunk search over a datastore
//! - [`Provider`]: the language model, complete or streaming
//!
//! Streaming output leaves the pipeline through a [`TokenSink`].
//! Implementations live in their own crates, so the orchestrator can be
//! driven by scripted fakes in tests.

pub mod error;
pub mod knowledge;
pub mod message;
pub mod provider;
pub mod sink;
pub mod strategy;

// Re-export key types at crate root for ergonomics
pub use error::{Error, KnowledgeError, ProviderError, Result, SinkError};
pub use knowledge::{KnowledgeStore, RetrievedChunk, SearchQuery};
pub use message::{Message, Role, Speaker, Turn};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use sink::TokenSink;
pub use strategy::PromptStrategy;
