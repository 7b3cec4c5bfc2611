//! Model definitions and traits
//!
//! This module defines the trait every embedding backend implements and the
//! factory that turns a [`ModelConfig`] into a loaded, ready model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::models::config::{Backend, ModelConfig, Pooling};
use crate::models::hashed::HashedEmbeddingModel;
use crate::models::{Embedding, EmbeddingError, EmbeddingResult};

/// Information about a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier
    pub name: String,
    pub backend: Backend,
    /// Embedding dimension, fixed once the model is loaded
    pub dimension: usize,
    pub max_sequence_length: usize,
    pub pooling: Pooling,
    pub normalize: bool,
}

impl ModelInfo {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            name: config.model.clone(),
            backend: config.backend,
            dimension: config.embedding_dimension.unwrap_or(0),
            max_sequence_length: config.max_sequence_length,
            pooling: config.pooling,
            normalize: config.normalize,
        }
    }
}

/// Core embedding model trait
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Get model information
    fn info(&self) -> &ModelInfo;

    /// Load weights and anything else needed before the first call
    async fn initialize(&mut self) -> EmbeddingResult<()> {
        Ok(())
    }

    /// Generate one embedding per text, in input order
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize {
        self.info().dimension
    }
}

/// ONNX-based embedding model implementation
#[cfg(feature = "onnx")]
pub mod onnx {
    use super::*;
    use std::sync::Mutex;

    use crate::onnx::{resolve_model_files, OnnxEmbeddingEngine};

    /// ONNX embedding model
    pub struct OnnxEmbeddingModel {
        info: ModelInfo,
        engine: Option<Arc<Mutex<OnnxEmbeddingEngine>>>,
        config: ModelConfig,
    }

    impl OnnxEmbeddingModel {
        /// Create a new ONNX embedding model
        pub fn new(config: ModelConfig) -> Self {
            Self {
                info: ModelInfo::from_config(&config),
                engine: None,
                config,
            }
        }

        fn load_failed(&self, error: impl std::fmt::Display) -> EmbeddingError {
            EmbeddingError::ModelLoadFailed {
                model_name: self.info.name.clone(),
                error: error.to_string(),
            }
        }
    }

    #[async_trait]
    impl EmbeddingModel for OnnxEmbeddingModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        async fn initialize(&mut self) -> EmbeddingResult<()> {
            let config = self.config.clone();

            // Hub download and session creation both block
            let engine = tokio::task::spawn_blocking(move || {
                let (model_path, tokenizer_path) = resolve_model_files(&config)?;
                OnnxEmbeddingEngine::new(&model_path, &tokenizer_path, &config)
            })
            .await
            .map_err(|e| self.load_failed(e))??;

            let dimension = engine.dimension();
            if let Some(expected) = self.config.embedding_dimension {
                if expected != dimension {
                    return Err(self.load_failed(format!(
                        "model produces {}-dimensional embeddings, config expects {}",
                        dimension, expected
                    )));
                }
            }

            self.info.dimension = dimension;
            self.engine = Some(Arc::new(Mutex::new(engine)));
            Ok(())
        }

        async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
            let engine = self.engine.clone().ok_or_else(|| EmbeddingError::EncodingFailed {
                error: format!("Model {} is not initialized", self.info.name),
            })?;
            let texts = texts.to_vec();

            tokio::task::spawn_blocking(move || {
                let mut engine = engine
                    .lock()
                    .map_err(|_| EmbeddingError::encoding("Inference session lock poisoned"))?;
                engine.embed_texts(&texts)
            })
            .await?
        }
    }
}

/// Factory for creating embedding models
pub struct ModelFactory;

impl ModelFactory {
    /// Create an uninitialized model from configuration
    pub fn create_model(config: &ModelConfig) -> EmbeddingResult<Box<dyn EmbeddingModel>> {
        match config.backend {
            Backend::Hashed => Ok(Box::new(HashedEmbeddingModel::new(config)?)),
            #[cfg(feature = "onnx")]
            Backend::Onnx => Ok(Box::new(onnx::OnnxEmbeddingModel::new(config.clone()))),
            #[cfg(not(feature = "onnx"))]
            Backend::Onnx => Err(EmbeddingError::ConfigError {
                message: "The onnx backend is not compiled in (enable the 'onnx' feature)"
                    .to_string(),
            }),
        }
    }
}

/// Validate the config, build the model and initialize it
pub async fn load_model(config: &ModelConfig) -> EmbeddingResult<Arc<dyn EmbeddingModel>> {
    config.validate()?;

    info!("📦 Loading {} model '{}'", config.backend, config.model);
    let mut model = ModelFactory::create_model(config)?;
    model.initialize().await?;

    let info = model.info();
    info!(
        "✅ Model '{}' ready ({} dimensions, {} pooling{})",
        info.name,
        info.dimension,
        info.pooling,
        if info.normalize { ", normalized" } else { "" }
    );

    Ok(Arc::from(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_hashed_model() {
        let model = load_model(&ModelConfig::hashed(24)).await.unwrap();
        assert_eq!(model.dimension(), 24);
        assert_eq!(model.info().backend, Backend::Hashed);

        let vectors = model
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_config() {
        let mut config = ModelConfig::hashed(8);
        config.model = String::new();
        let err = load_model(&config).await.err().unwrap();
        assert!(err.is_startup_error());
    }

    #[test]
    fn test_model_info_from_config() {
        let info = ModelInfo::from_config(&ModelConfig::hashed(384));
        assert_eq!(info.name, "hashed");
        assert_eq!(info.dimension, 384);
        assert_eq!(info.pooling, Pooling::Mean);
        assert!(!info.normalize);
    }
}
