//! Embedding Server Configuration
//!
//! Read from a TOML file whose sections all fall back to defaults, then
//! adjusted by a few environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::config::ModelConfig;
use crate::models::EmbeddingError;

/// Config file path used when `EMBED_SERVER_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub const ENV_CONFIG_PATH: &str = "EMBED_SERVER_CONFIG";
pub const ENV_BIND_ADDRESS: &str = "EMBED_BIND_ADDRESS";
pub const ENV_MODEL: &str = "EMBED_MODEL";
pub const ENV_MODEL_DIR: &str = "EMBED_MODEL_DIR";
pub const ENV_BACKEND: &str = "EMBED_BACKEND";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub embedding: ModelConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: String,
    pub max_body_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_body_bytes: 5242880,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    /// Log per-stage request timings at info instead of debug
    pub log_request_timings: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_request_timings: false,
        }
    }
}

impl MonitoringConfig {
    /// `EnvFilter` directive for the configured level
    pub fn filter_directive(&self) -> String {
        match self.log_level.to_lowercase().as_str() {
            "trace" => "sentence_embed_server=trace,trace".to_string(),
            "debug" => "sentence_embed_server=debug,debug".to_string(),
            "warn" => "sentence_embed_server=warn,warn".to_string(),
            "error" => "sentence_embed_server=error,error".to_string(),
            _ => "sentence_embed_server=info,info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EmbeddingError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, EmbeddingError> {
        let config: ServerConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load the process configuration
    ///
    /// The file named by `EMBED_SERVER_CONFIG` must exist. Without it,
    /// `config.toml` is read when present and defaults are used otherwise.
    /// Environment overrides are applied last.
    pub fn load() -> Result<Self, EmbeddingError> {
        let config =
            Self::read_with(|key| std::env::var(key).ok(), Path::new(DEFAULT_CONFIG_PATH))?;
        config.validate()?;
        Ok(config)
    }

    /// Read the config file chosen through `lookup` and apply overrides,
    /// without validating
    pub fn read_with<F>(lookup: F, default_path: &Path) -> Result<Self, EmbeddingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_CONFIG_PATH) {
            Some(path) => Self::from_file(path)?,
            None if default_path.is_file() => Self::from_file(default_path)?,
            None => Self::default(),
        };

        config.apply_overrides(&lookup)?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), EmbeddingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup(ENV_BIND_ADDRESS) {
            self.network.bind_address = address;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.embedding.model = model;
        }
        if let Some(dir) = lookup(ENV_MODEL_DIR) {
            self.embedding.model_dir = Some(dir).filter(|d| !d.is_empty());
        }
        if let Some(backend) = lookup(ENV_BACKEND) {
            self.embedding.backend = backend.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.network.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(EmbeddingError::ConfigError {
                message: format!(
                    "bind_address '{}' is not a socket address",
                    self.network.bind_address
                ),
            });
        }

        if self.network.max_body_bytes == 0 {
            return Err(EmbeddingError::ConfigError {
                message: "max_body_bytes must be at least 1".to_string(),
            });
        }

        self.embedding.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::Backend;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.network.bind_address, "0.0.0.0:8000");
        assert_eq!(config.embedding.model, "Supabase/gte-small");
        assert_eq!(config.monitoring.log_level, "info");
    }

    #[test]
    fn test_from_str_partial() {
        let config = ServerConfig::from_str(
            r#"
            [network]
            bind_address = "127.0.0.1:9000"

            [embedding]
            backend = "hashed"
            embedding_dimension = 64
            max_batch_size = 8

            [monitoring]
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.network.bind_address, "127.0.0.1:9000");
        assert_eq!(config.network.max_body_bytes, 5242880);
        assert_eq!(config.embedding.backend, Backend::Hashed);
        assert_eq!(config.embedding.max_batch_size, 8);
        assert_eq!(
            config.monitoring.filter_directive(),
            "sentence_embed_server=debug,debug"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = ServerConfig::from_str("").unwrap();
        assert_eq!(config.network.bind_address, "0.0.0.0:8000");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_BIND_ADDRESS, "127.0.0.1:8123"),
            (ENV_MODEL, "BAAI/bge-small-en-v1.5"),
            (ENV_MODEL_DIR, "/srv/models/bge"),
            (ENV_BACKEND, "hashed"),
        ]
        .into_iter()
        .collect();

        let mut config = ServerConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.network.bind_address, "127.0.0.1:8123");
        assert_eq!(config.embedding.model, "BAAI/bge-small-en-v1.5");
        assert_eq!(config.embedding.model_dir.as_deref(), Some("/srv/models/bge"));
        assert_eq!(config.embedding.backend, Backend::Hashed);
    }

    #[test]
    fn test_bad_override_and_address() {
        let mut config = ServerConfig::default();
        assert!(config
            .apply_overrides(|key| (key == ENV_BACKEND).then(|| "torch".to_string()))
            .is_err());

        let mut config = ServerConfig::default();
        config.network.bind_address = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    fn scratch_file(content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("embed-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_from_config_path_variable() {
        let path = scratch_file(
            r#"
            [network]
            bind_address = "127.0.0.1:9100"

            [embedding]
            backend = "hashed"
            embedding_dimension = 12
            "#,
        );
        let path_str = path.to_string_lossy().to_string();
        let missing_default = std::env::temp_dir().join("embed-config-missing.toml");

        let config = ServerConfig::read_with(
            |key| match key {
                ENV_CONFIG_PATH => Some(path_str.clone()),
                ENV_MODEL => Some("local-hash".to_string()),
                _ => None,
            },
            &missing_default,
        )
        .unwrap();

        assert_eq!(config.network.bind_address, "127.0.0.1:9100");
        assert_eq!(config.embedding.backend, Backend::Hashed);
        assert_eq!(config.embedding.embedding_dimension, Some(12));
        assert_eq!(config.embedding.model, "local-hash");
        assert!(config.validate().is_ok());

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_named_config_is_an_error() {
        let missing = std::env::temp_dir()
            .join(format!("embed-config-{}.toml", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .to_string();

        let err = ServerConfig::read_with(
            |key| (key == ENV_CONFIG_PATH).then(|| missing.clone()),
            Path::new(DEFAULT_CONFIG_PATH),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EmbeddingError::IoError { .. }));
    }

    #[test]
    fn test_defaults_without_any_config_file() {
        let missing_default =
            std::env::temp_dir().join(format!("embed-config-{}.toml", uuid::Uuid::new_v4()));

        let config = ServerConfig::read_with(|_| None, &missing_default).unwrap();
        assert_eq!(config.network.bind_address, "0.0.0.0:8000");
        assert_eq!(config.embedding.model, "Supabase/gte-small");
        assert_eq!(config.monitoring.log_level, "info");
    }

    #[test]
    fn test_default_path_is_read_when_present() {
        let path = scratch_file("[monitoring]\nlog_level = \"warn\"\n");

        let config = ServerConfig::read_with(|_| None, &path).unwrap();
        assert_eq!(config.monitoring.log_level, "warn");

        std::fs::remove_file(path).unwrap();
    }
}
