//! # ONNX Embedding Engine
//!
//! Sentence embeddings from an ONNX export of a sentence-transformer
//! (BERT family, e.g. gte-small) using ONNX Runtime and a HuggingFace
//! tokenizer.
//!
//! A batch is tokenized in one call, padded to its longest member, run
//! through the graph once, then reduced per sentence with the configured
//! pooling. L2 normalization is optional and off by default, which matches
//! what `SentenceTransformer.encode` returns for gte-small.

use ndarray::{ArrayView2, ArrayView3, Axis};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info, instrument};

use crate::models::config::{ModelConfig, Pooling};
use crate::models::{Embedding, EmbeddingError};

/// Output names that carry token-level hidden states, in preference order
const HIDDEN_STATE_OUTPUTS: [&str; 2] = ["last_hidden_state", "token_embeddings"];

const DIMENSION_PROBE: &str = "dimension probe";

/// ONNX-based embedding engine for generating text embeddings
pub struct OnnxEmbeddingEngine {
    /// ONNX Runtime session for model inference
    session: Session,
    /// HuggingFace tokenizer, truncating and batch-padding
    tokenizer: Tokenizer,
    /// Graph output holding [batch, seq_len, hidden] states
    output_name: String,
    /// Whether the graph declares a token_type_ids input
    uses_token_type_ids: bool,
    pooling: Pooling,
    normalize: bool,
    dimension: usize,
}

impl std::fmt::Debug for OnnxEmbeddingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingEngine")
            .field("output_name", &self.output_name)
            .field("uses_token_type_ids", &self.uses_token_type_ids)
            .field("pooling", &self.pooling)
            .field("normalize", &self.normalize)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingEngine {
    /// Create a new ONNX embedding engine
    ///
    /// Loads the session and tokenizer, then runs one probe inference to
    /// learn the embedding dimension.
    pub fn new(
        model_path: &Path,
        tokenizer_path: &Path,
        config: &ModelConfig,
    ) -> Result<Self, EmbeddingError> {
        info!(
            "Initializing ONNX embedding engine with model: {}",
            model_path.display()
        );

        let load_failed = |what: &str, e: &dyn std::fmt::Display| EmbeddingError::ModelLoadFailed {
            model_name: config.model.clone(),
            error: format!("{}: {}", what, e),
        };

        let session = Session::builder()
            .map_err(|e| load_failed("Failed to create session builder", &e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_failed("Failed to set optimization level", &e))?
            .with_intra_threads(config.num_threads.max(1))
            .map_err(|e| load_failed("Failed to set intra threads", &e))?
            .commit_from_file(model_path)
            .map_err(|e| load_failed("Failed to load ONNX model", &e))?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        debug!("Model inputs: {:?}, outputs: {:?}", input_names, output_names);

        for required in ["input_ids", "attention_mask"] {
            if !input_names.iter().any(|name| name == required) {
                return Err(load_failed(
                    "Unsupported model graph",
                    &format!("missing input '{}'", required),
                ));
            }
        }

        let output_name = HIDDEN_STATE_OUTPUTS
            .iter()
            .find_map(|wanted| output_names.iter().find(|name| name == wanted))
            .or_else(|| output_names.first())
            .cloned()
            .ok_or_else(|| load_failed("Unsupported model graph", &"model has no outputs"))?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| load_failed("Failed to load tokenizer", &e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_sequence_length,
                ..Default::default()
            }))
            .map_err(|e| load_failed("Failed to configure truncation", &e))?;
        let padding = match tokenizer.get_padding() {
            Some(existing) => PaddingParams {
                strategy: PaddingStrategy::BatchLongest,
                ..existing.clone()
            },
            None => PaddingParams::default(),
        };
        tokenizer.with_padding(Some(padding));

        let mut engine = Self {
            uses_token_type_ids: input_names.iter().any(|name| name == "token_type_ids"),
            session,
            tokenizer,
            output_name,
            pooling: config.pooling,
            normalize: config.normalize,
            dimension: 0,
        };

        let probe = engine
            .embed_texts(&[DIMENSION_PROBE.to_string()])
            .map_err(|e| load_failed("Probe inference failed", &e))?;
        engine.dimension = probe.first().map(Vec::len).unwrap_or(0);
        if engine.dimension == 0 {
            return Err(load_failed("Probe inference failed", &"empty embedding"));
        }

        info!(
            "ONNX embedding engine initialized ({} dimensions, {} threads)",
            engine.dimension, config.num_threads
        );
        Ok(engine)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Generate embeddings for a batch of texts, one per text in order
    #[instrument(skip(self, texts), fields(text_count = texts.len()))]
    pub fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| EmbeddingError::encoding(format!("Tokenization failed: {}", e)))?;

        let batch = encodings.len();
        let seq_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        if seq_len == 0 {
            return Err(EmbeddingError::encoding("Tokenizer produced no tokens"));
        }

        let mut input_ids = Vec::with_capacity(batch * seq_len);
        let mut attention_mask = Vec::with_capacity(batch * seq_len);
        let mut token_type_ids = Vec::with_capacity(batch * seq_len);

        for encoding in &encodings {
            let padding = seq_len - encoding.get_ids().len();
            input_ids.extend(encoding.get_ids().iter().map(|&x| x as i64));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&x| x as i64));
            token_type_ids.extend(encoding.get_type_ids().iter().map(|&x| x as i64));

            input_ids.extend(std::iter::repeat(0i64).take(padding));
            attention_mask.extend(std::iter::repeat(0i64).take(padding));
            token_type_ids.extend(std::iter::repeat(0i64).take(padding));
        }

        let pooling_mask = attention_mask.clone();
        let shape = [batch as i64, seq_len as i64];

        let tensor = |name: &str, data: Vec<i64>| {
            Tensor::from_array((shape, data)).map_err(|e| {
                EmbeddingError::encoding(format!("Failed to create {} tensor: {}", name, e))
            })
        };

        let mut session_inputs = vec![
            ("input_ids", tensor("input_ids", input_ids)?),
            ("attention_mask", tensor("attention_mask", attention_mask)?),
        ];
        if self.uses_token_type_ids {
            session_inputs.push(("token_type_ids", tensor("token_type_ids", token_type_ids)?));
        }

        let outputs = self
            .session
            .run(session_inputs)
            .map_err(|e| EmbeddingError::encoding(format!("ONNX inference failed: {}", e)))?;

        let (out_shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                EmbeddingError::encoding(format!("Failed to extract output tensor: {}", e))
            })?;

        let dims: Vec<usize> = out_shape.iter().map(|&x| x as usize).collect();
        if dims.len() != 3 || dims[0] != batch || dims[1] != seq_len {
            return Err(EmbeddingError::encoding(format!(
                "Expected output of shape [{}, {}, hidden], got {:?}",
                batch, seq_len, dims
            )));
        }

        let hidden = ArrayView3::from_shape((dims[0], dims[1], dims[2]), data).map_err(|e| {
            EmbeddingError::encoding(format!("Failed to create output array view: {}", e))
        })?;

        let mut embeddings = Vec::with_capacity(batch);
        for (row, mask) in pooling_mask.chunks(seq_len).enumerate() {
            let tokens = hidden.index_axis(Axis(0), row);
            let pooled = match self.pooling {
                Pooling::Mean => mean_pooling(&tokens, mask)?,
                Pooling::Cls => cls_pooling(&tokens)?,
            };
            embeddings.push(if self.normalize {
                normalize_embedding(pooled)
            } else {
                pooled
            });
        }

        debug!("Generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }
}

/// Average the hidden states of tokens whose mask is set
///
/// `tokens` is [seq_len, hidden] for one sentence.
pub(crate) fn mean_pooling(
    tokens: &ArrayView2<f32>,
    attention_mask: &[i64],
) -> Result<Embedding, EmbeddingError> {
    let (seq_len, hidden_size) = tokens.dim();
    if attention_mask.len() != seq_len {
        return Err(EmbeddingError::encoding(format!(
            "Attention mask length {} doesn't match sequence length {}",
            attention_mask.len(),
            seq_len
        )));
    }

    let mut pooled = vec![0.0f32; hidden_size];
    let mut valid_tokens = 0usize;

    for (token, &mask) in tokens.outer_iter().zip(attention_mask) {
        if mask == 0 {
            continue;
        }
        for (acc, value) in pooled.iter_mut().zip(token.iter()) {
            *acc += value;
        }
        valid_tokens += 1;
    }

    if valid_tokens == 0 {
        return Err(EmbeddingError::encoding(
            "No valid tokens found in attention mask",
        ));
    }

    for value in &mut pooled {
        *value /= valid_tokens as f32;
    }
    Ok(pooled)
}

/// Hidden state of the first ([CLS]) token
pub(crate) fn cls_pooling(tokens: &ArrayView2<f32>) -> Result<Embedding, EmbeddingError> {
    tokens
        .outer_iter()
        .next()
        .map(|first| first.to_vec())
        .ok_or_else(|| EmbeddingError::encoding("Empty token sequence"))
}

/// L2 normalization; a zero vector is returned unchanged
pub(crate) fn normalize_embedding(mut embedding: Embedding) -> Embedding {
    let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        embedding.iter_mut().for_each(|x| *x /= norm);
    }
    embedding
}
