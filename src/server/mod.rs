//! Server module

pub mod config;
pub mod hyper_server;
pub mod server;

pub use config::ServerConfig;
pub use hyper_server::{handle_request, ServerState};
pub use server::{EmbeddingServer, ServerError};
