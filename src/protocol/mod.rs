//! Wire types of the HTTP API

pub mod http;

pub use http::{EmbeddingRequest, HealthResponse, HttpErrorResponse, RequestError};
