//! Knowledge store backends for ragchat.
//!
//! Available backends:
//! - **InMemory**: keyword-scored documents held in process
//! - **File**: JSONL documents loaded from disk
//! - **Http**: a remote datastore's query endpoint
//!
//! All backends implement `ragchat_core::KnowledgeStore`. The
//! [`DatastoreRegistry`] resolves datastore ids to backends.

pub mod file;
pub mod http;
pub mod in_memory;
pub mod registry;

pub use file::FileKnowledgeStore;
pub use http::HttpKnowledgeStore;
pub use in_memory::{Document, InMemoryKnowledgeStore};
pub use registry::DatastoreRegistry;
