//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via ZTERADB_CONFIG or an explicit path)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zteradb_query::Env;

/// Payload codec requested from the server. Only JSON exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseDataType {
    #[default]
    Json,
}

/// Connection pool bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Transports opened eagerly at pool construction.
    pub min: u32,
    /// Pool ceiling; `0` means unbounded.
    pub max: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { min: 1, max: 1 }
    }
}

/// Nested option block, mirroring the configuration file layout.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    pub connection_pool: PoolConfig,
}

/// Client configuration. Immutable once handed to a pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client_key: String,
    pub access_key: String,
    pub secret_key: String,
    pub database_id: String,
    pub env: Env,
    pub response_data_type: ResponseDataType,
    pub use_tls: bool,
    pub verify_tls_host: bool,
    pub options: OptionsConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_key: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            database_id: String::new(),
            env: Env::Dev,
            response_data_type: ResponseDataType::Json,
            use_tls: false,
            verify_tls_host: false,
            options: OptionsConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(
        client_key: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        database_id: impl Into<String>,
        env: Env,
    ) -> Self {
        Self {
            client_key: client_key.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            database_id: database_id.into(),
            env,
            ..Self::default()
        }
    }

    /// Loads configuration from file (if ZTERADB_CONFIG is set), then applies
    /// environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if let Ok(path) = std::env::var("ZTERADB_CONFIG") {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: ClientConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies `ZTERADB_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("ZTERADB_CLIENT_KEY") {
            self.client_key = key;
        }
        if let Ok(key) = std::env::var("ZTERADB_ACCESS_KEY") {
            self.access_key = key;
        }
        if let Ok(key) = std::env::var("ZTERADB_SECRET_KEY") {
            self.secret_key = key;
        }
        if let Ok(id) = std::env::var("ZTERADB_DATABASE_ID") {
            self.database_id = id;
        }
        if let Ok(env) = std::env::var("ZTERADB_ENV") {
            if let Ok(parsed) = env.parse() {
                self.env = parsed;
            }
        }
        if let Ok(tls) = std::env::var("ZTERADB_USE_TLS") {
            self.use_tls = tls == "1" || tls.to_lowercase() == "true";
        }
        if let Ok(verify) = std::env::var("ZTERADB_VERIFY_TLS_HOST") {
            self.verify_tls_host = verify == "1" || verify.to_lowercase() == "true";
        }
        if let Ok(min) = std::env::var("ZTERADB_POOL_MIN") {
            if let Ok(n) = min.parse() {
                self.options.connection_pool.min = n;
            }
        }
        if let Ok(max) = std::env::var("ZTERADB_POOL_MAX") {
            if let Ok(n) = max.parse() {
                self.options.connection_pool.max = n;
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("client_key", &self.client_key),
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("database_id", &self.database_id),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Validation(format!("{name} must not be empty")));
            }
        }

        let pool = self.options.connection_pool;
        if pool.max != 0 && pool.min > pool.max {
            return Err(ConfigError::Validation(format!(
                "connection_pool.min ({}) must not exceed max ({})",
                pool.min, pool.max
            )));
        }

        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0:?}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("failed to parse config file {0:?}: {1}")]
    Parse(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> ClientConfig {
        ClientConfig::new("ck", "ak", "sk", "db-1", Env::Dev)
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.options.connection_pool.min, 1);
        assert_eq!(config.options.connection_pool.max, 1);
        assert!(!config.use_tls);
        assert!(!config.verify_tls_host);
        assert_eq!(config.response_data_type, ResponseDataType::Json);
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_keys() {
        let mut config = valid_config();
        config.secret_key.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("secret_key"));
    }

    #[test]
    fn test_validate_pool_bounds() {
        let mut config = valid_config();
        config.options.connection_pool.min = 5;
        config.options.connection_pool.max = 2;
        assert!(config.validate().is_err());

        // max == 0 means unbounded, so any min is fine.
        config.options.connection_pool.max = 0;
        assert!(config.validate().is_ok());

        config.options.connection_pool.min = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = valid_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: ClientConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.client_key, "ck");
        assert_eq!(parsed.env, Env::Dev);
        assert_eq!(parsed.options.connection_pool.min, 1);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "client_key: ck\naccess_key: ak\nsecret_key: sk\ndatabase_id: db-9\nenv: prod\nuse_tls: true\noptions:\n  connection_pool:\n    min: 2\n    max: 8\n"
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database_id, "db-9");
        assert_eq!(config.env, Env::Prod);
        assert!(config.use_tls);
        assert!(!config.verify_tls_host);
        assert_eq!(config.options.connection_pool.min, 2);
        assert_eq!(config.options.connection_pool.max, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_missing() {
        let err = ClientConfig::from_file("/nonexistent/zteradb.yaml").unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
