//! Configuration for the embedding model
//!
//! This is the `[embedding]` section of the server's config.toml. It names
//! the model, picks a backend and carries the inference parameters.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::EmbeddingError;

/// Which implementation produces the vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ONNX Runtime session over a sentence-transformer export
    Onnx,
    /// Model-free deterministic vectors derived from a hash of the text
    Hashed,
}

impl std::str::FromStr for Backend {
    type Err = EmbeddingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "onnx" => Ok(Backend::Onnx),
            "hashed" => Ok(Backend::Hashed),
            other => Err(EmbeddingError::ConfigError {
                message: format!("Unknown backend '{}' (expected 'onnx' or 'hashed')", other),
            }),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Onnx => write!(f, "onnx"),
            Backend::Hashed => write!(f, "hashed"),
        }
    }
}

/// How token embeddings are reduced to one sentence vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Attention-masked average over tokens
    Mean,
    /// Hidden state of the first token
    Cls,
}

impl std::fmt::Display for Pooling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pooling::Mean => write!(f, "mean"),
            Pooling::Cls => write!(f, "cls"),
        }
    }
}

/// Configuration for the served model
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier, a HuggingFace repo id for the onnx backend
    pub model: String,
    pub backend: Backend,

    /// Local directory holding the model files; when unset the files are
    /// fetched from the hub by `model`
    pub model_dir: Option<String>,
    /// Paths of the files, relative to the model directory or repo root
    pub model_file: String,
    pub tokenizer_file: String,

    /// Model parameters
    pub max_sequence_length: usize,
    /// Expected output dimension; checked against the loaded model
    pub embedding_dimension: Option<usize>,
    pub pooling: Pooling,
    pub normalize: bool,

    /// Sentences per inference call
    pub batch_size: usize,
    /// Sentences accepted in one request
    pub max_batch_size: usize,
    pub num_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "Supabase/gte-small".to_string(),
            backend: Backend::Onnx,
            model_dir: None,
            model_file: "onnx/model.onnx".to_string(),
            tokenizer_file: "tokenizer.json".to_string(),
            max_sequence_length: 512,
            embedding_dimension: None,
            pooling: Pooling::Mean,
            normalize: false,
            batch_size: 32,
            max_batch_size: 1024,
            num_threads: 4,
        }
    }
}

impl ModelConfig {
    /// Config for the hashed backend with the given dimension
    pub fn hashed(dimension: usize) -> Self {
        Self {
            model: "hashed".to_string(),
            backend: Backend::Hashed,
            embedding_dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// Resolve a file of the model against `model_dir`, if one is set
    pub fn local_path(&self, file: &str) -> Option<PathBuf> {
        self.model_dir.as_ref().map(|dir| Path::new(dir).join(file))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.model.trim().is_empty() {
            return Err(EmbeddingError::ConfigError {
                message: "Model identifier cannot be empty".to_string(),
            });
        }

        if self.batch_size == 0 {
            return Err(EmbeddingError::ConfigError {
                message: "batch_size must be at least 1".to_string(),
            });
        }

        if self.max_batch_size == 0 {
            return Err(EmbeddingError::ConfigError {
                message: "max_batch_size must be at least 1".to_string(),
            });
        }

        if self.max_sequence_length == 0 {
            return Err(EmbeddingError::ConfigError {
                message: "max_sequence_length must be at least 1".to_string(),
            });
        }

        if self.embedding_dimension == Some(0) {
            return Err(EmbeddingError::ConfigError {
                message: "embedding_dimension must be at least 1".to_string(),
            });
        }

        match self.backend {
            Backend::Hashed if self.embedding_dimension.is_none() => {
                return Err(EmbeddingError::ConfigError {
                    message: "The hashed backend requires embedding_dimension".to_string(),
                });
            }
            Backend::Onnx if !cfg!(feature = "onnx") => {
                return Err(EmbeddingError::ConfigError {
                    message: "The onnx backend is not compiled in (enable the 'onnx' feature)"
                        .to_string(),
                });
            }
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_served_model() {
        let config = ModelConfig::default();
        assert_eq!(config.model, "Supabase/gte-small");
        assert_eq!(config.pooling, Pooling::Mean);
        assert!(!config.normalize);
        assert!(config.local_path("tokenizer.json").is_none());
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: ModelConfig = toml::from_str(
            r#"
            backend = "hashed"
            embedding_dimension = 16
            pooling = "cls"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, Backend::Hashed);
        assert_eq!(config.pooling, Pooling::Cls);
        assert_eq!(config.batch_size, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hashed_requires_dimension() {
        let config = ModelConfig {
            backend: Backend::Hashed,
            embedding_dimension: None,
            ..ModelConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_sizes() {
        let mut config = ModelConfig::hashed(8);
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = ModelConfig::hashed(8);
        config.max_batch_size = 0;
        assert!(config.validate().is_err());

        assert!(ModelConfig::hashed(0).validate().is_err());
    }

    #[test]
    fn test_local_path() {
        let config = ModelConfig {
            model_dir: Some("/models/gte-small".to_string()),
            ..ModelConfig::default()
        };
        assert_eq!(
            config.local_path("tokenizer.json"),
            Some(PathBuf::from("/models/gte-small/tokenizer.json"))
        );
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("ONNX".parse::<Backend>().unwrap(), Backend::Onnx);
        assert_eq!(" hashed ".parse::<Backend>().unwrap(), Backend::Hashed);
        assert!("python".parse::<Backend>().is_err());
    }
}
