//! ONNX backend: model file resolution and the inference engine

pub mod hub;
pub mod onnx_engine;

pub use hub::resolve_model_files;
pub use onnx_engine::OnnxEmbeddingEngine;
