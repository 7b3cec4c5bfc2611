//! Hashed embedding backend
//!
//! Produces deterministic vectors without any model weights: the SHA-256
//! digest of the sentence (extended with a block counter for dimensions past
//! 32) is read as signed bytes and scaled into [-1, 1]. Vectors carry no
//! semantics; the backend exists for offline smoke runs and tests.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::models::config::ModelConfig;
use crate::models::model::{EmbeddingModel, ModelInfo};
use crate::models::{Embedding, EmbeddingError, EmbeddingResult};

pub struct HashedEmbeddingModel {
    info: ModelInfo,
}

impl HashedEmbeddingModel {
    pub fn new(config: &ModelConfig) -> EmbeddingResult<Self> {
        let dimension = config
            .embedding_dimension
            .filter(|&d| d > 0)
            .ok_or_else(|| EmbeddingError::ConfigError {
                message: "The hashed backend requires a non-zero embedding_dimension".to_string(),
            })?;

        let mut info = ModelInfo::from_config(config);
        info.dimension = dimension;
        Ok(Self { info })
    }

    /// Vector for one sentence
    pub fn hash_to_vector(&self, text: &str) -> Embedding {
        let dimension = self.info.dimension;
        let mut vector = Vec::with_capacity(dimension);
        let mut block: u32 = 0;

        while vector.len() < dimension {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(block.to_le_bytes());
            let digest = hasher.finalize();

            for byte in digest.iter().take(dimension - vector.len()) {
                vector.push(*byte as i8 as f32 / 127.0);
            }
            block += 1;
        }

        if self.info.normalize {
            let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                vector.iter_mut().for_each(|x| *x /= norm);
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingModel for HashedEmbeddingModel {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.hash_to_vector(t)).collect())
    }
}
