//! Sentence Embedding Server Library
//!
//! HTTP service that turns a list of sentences into a list of embedding
//! vectors with a pretrained sentence-transformer.

pub mod models;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod protocol;
pub mod server;

// Re-exports
pub use models::{Embedding, EmbeddingError, EmbeddingService};
pub use protocol::{EmbeddingRequest, HealthResponse};
pub use server::{EmbeddingServer, ServerConfig, ServerError};
