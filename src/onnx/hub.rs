//! Locating model files
//!
//! With `model_dir` set the files are read from disk. Otherwise the model
//! identifier is treated as a HuggingFace Hub repo and the files are
//! downloaded into (or reused from) the local hub cache.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::config::ModelConfig;
use crate::models::{EmbeddingError, EmbeddingResult};

/// Paths of the ONNX graph and the tokenizer for the configured model
pub fn resolve_model_files(config: &ModelConfig) -> EmbeddingResult<(PathBuf, PathBuf)> {
    match &config.model_dir {
        Some(dir) => {
            let dir = Path::new(dir);
            let model = find_local(config, dir, &config.model_file)?;
            let tokenizer = find_local(config, dir, &config.tokenizer_file)?;
            Ok((model, tokenizer))
        }
        None => fetch_from_hub(config),
    }
}

/// `file` under `dir`, falling back to its bare file name at the top level
fn find_local(config: &ModelConfig, dir: &Path, file: &str) -> EmbeddingResult<PathBuf> {
    let nested = dir.join(file);
    if nested.is_file() {
        return Ok(nested);
    }

    if let Some(name) = Path::new(file).file_name() {
        let flat = dir.join(name);
        if flat.is_file() {
            return Ok(flat);
        }
    }

    Err(EmbeddingError::ModelLoadFailed {
        model_name: config.model.clone(),
        error: format!("File not found: {}", nested.display()),
    })
}

fn fetch_from_hub(config: &ModelConfig) -> EmbeddingResult<(PathBuf, PathBuf)> {
    let hub_failed = |e: hf_hub::api::sync::ApiError| EmbeddingError::ModelLoadFailed {
        model_name: config.model.clone(),
        error: format!("HuggingFace Hub: {}", e),
    };

    info!("⬇️  Resolving '{}' from the HuggingFace Hub", config.model);
    let api = hf_hub::api::sync::Api::new().map_err(hub_failed)?;
    let repo = api.model(config.model.clone());

    let model = repo.get(&config.model_file).map_err(hub_failed)?;
    let tokenizer = repo.get(&config.tokenizer_file).map_err(hub_failed)?;
    info!("📁 Model files at {}", model.display());

    Ok((model, tokenizer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("embed-hub-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_local_nested_and_flat_layouts() {
        let dir = scratch_dir();
        std::fs::create_dir_all(dir.join("onnx")).unwrap();
        std::fs::write(dir.join("onnx/model.onnx"), b"graph").unwrap();
        std::fs::write(dir.join("tokenizer.json"), b"{}").unwrap();

        let config = ModelConfig {
            model_dir: Some(dir.to_string_lossy().to_string()),
            ..ModelConfig::default()
        };
        let (model, tokenizer) = resolve_model_files(&config).unwrap();
        assert_eq!(model, dir.join("onnx/model.onnx"));
        assert_eq!(tokenizer, dir.join("tokenizer.json"));

        // model.onnx at the top level is found too
        std::fs::remove_file(dir.join("onnx/model.onnx")).unwrap();
        std::fs::write(dir.join("model.onnx"), b"graph").unwrap();
        let (model, _) = resolve_model_files(&config).unwrap();
        assert_eq!(model, dir.join("model.onnx"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_local_file() {
        let dir = scratch_dir();
        let config = ModelConfig {
            model_dir: Some(dir.to_string_lossy().to_string()),
            ..ModelConfig::default()
        };

        let err = resolve_model_files(&config).unwrap_err();
        assert!(err.is_startup_error());
        assert!(err.to_string().contains("File not found"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
