//! Embedding service
//!
//! Owns the single model loaded at startup and exposes `encode`, the only
//! operation the HTTP front needs. The service enforces the output
//! contract: one vector per sentence, in order, all of the model's
//! dimension, and nothing partial on failure.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::models::config::ModelConfig;
use crate::models::model::{load_model, EmbeddingModel, ModelInfo};
use crate::models::{Embedding, EmbeddingError, EmbeddingResult};

/// Read-only handle to the loaded model
#[derive(Clone)]
pub struct EmbeddingService {
    model: Arc<dyn EmbeddingModel>,
    batch_size: usize,
    max_batch_size: usize,
}

impl EmbeddingService {
    /// Load the configured model and wrap it
    pub async fn from_config(config: &ModelConfig) -> EmbeddingResult<Self> {
        let model = load_model(config).await?;
        Ok(Self::with_model(model, config.batch_size, config.max_batch_size))
    }

    /// Wrap an already initialized model
    pub fn with_model(
        model: Arc<dyn EmbeddingModel>,
        batch_size: usize,
        max_batch_size: usize,
    ) -> Self {
        Self {
            model,
            batch_size: batch_size.max(1),
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn info(&self) -> &ModelInfo {
        self.model.info()
    }

    pub fn dimension(&self) -> usize {
        self.model.dimension()
    }

    /// Largest number of sentences accepted in a single request
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Embed every sentence, preserving order
    ///
    /// Sentences go to the model in sub-batches of at most `batch_size`.
    /// Any failing sub-batch fails the whole call.
    #[instrument(skip(self, sentences), fields(sentence_count = sentences.len()))]
    pub async fn encode(&self, sentences: &[String]) -> EmbeddingResult<Vec<Embedding>> {
        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let dimension = self.dimension();
        let mut embeddings = Vec::with_capacity(sentences.len());

        for chunk in sentences.chunks(self.batch_size) {
            let vectors = self.model.embed_batch(chunk).await?;

            if vectors.len() != chunk.len() {
                return Err(EmbeddingError::EncodingFailed {
                    error: format!(
                        "Model returned {} embeddings for {} sentences",
                        vectors.len(),
                        chunk.len()
                    ),
                });
            }

            if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
                return Err(EmbeddingError::EncodingFailed {
                    error: format!(
                        "Model returned a {}-dimensional embedding, expected {}",
                        bad.len(),
                        dimension
                    ),
                });
            }

            embeddings.extend(vectors);
        }

        debug!("Encoded {} sentences", embeddings.len());
        Ok(embeddings)
    }
}
