//! memoryx-core - cognitive memory retrieval engine
//!
//! Orchestrates LLM-based cognitive sector classification, envelope
//! encryption, composite relevance scoring and a temporal knowledge graph
//! on top of a backend-agnostic vector store.

pub mod classifier;
pub mod config;
pub mod crypto;
pub mod embedding;
pub mod error;
pub mod memory_service;
pub mod scoring;
pub mod temporal;
pub mod types;
pub mod vector_store;

pub use config::Config;
pub use error::{MemoryError, Result};
pub use memory_service::MemoryService;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
