//! Embedding models: configuration, backends and the service that owns
//! the loaded model for the lifetime of the process.

pub mod config;
pub mod hashed;
pub mod model;
pub mod service;

// Re-exports
pub use config::{Backend, ModelConfig, Pooling};
pub use model::{load_model, EmbeddingModel, ModelInfo};
pub use service::EmbeddingService;

/// Embedding vector type
pub type Embedding = Vec<f32>;

/// Result type for embedding models operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Errors that can occur in embedding models operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Model loading failed: {model_name} - {error}")]
    ModelLoadFailed { model_name: String, error: String },

    #[error("Encoding failed: {error}")]
    EncodingFailed { error: String },

    #[error("IO error: {error}")]
    IoError { error: std::io::Error },

    #[error("TOML parsing error: {error}")]
    TomlError { error: toml::de::Error },
}

impl EmbeddingError {
    pub(crate) fn encoding(error: impl std::fmt::Display) -> Self {
        EmbeddingError::EncodingFailed {
            error: error.to_string(),
        }
    }

    /// True for failures that happen while a model is being set up, as
    /// opposed to failures on a particular request.
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            EmbeddingError::ConfigError { .. }
                | EmbeddingError::ModelLoadFailed { .. }
                | EmbeddingError::IoError { .. }
                | EmbeddingError::TomlError { .. }
        )
    }
}

impl From<std::io::Error> for EmbeddingError {
    fn from(error: std::io::Error) -> Self {
        EmbeddingError::IoError { error }
    }
}

impl From<toml::de::Error> for EmbeddingError {
    fn from(error: toml::de::Error) -> Self {
        EmbeddingError::TomlError { error }
    }
}

impl From<tokio::task::JoinError> for EmbeddingError {
    fn from(error: tokio::task::JoinError) -> Self {
        EmbeddingError::EncodingFailed {
            error: format!("Inference task failed: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_error_classification() {
        let load = EmbeddingError::ModelLoadFailed {
            model_name: "m".to_string(),
            error: "missing file".to_string(),
        };
        assert!(load.is_startup_error());
        assert!(!EmbeddingError::encoding("boom").is_startup_error());
        assert_eq!(
            EmbeddingError::encoding("boom").to_string(),
            "Encoding failed: boom"
        );
    }
}
