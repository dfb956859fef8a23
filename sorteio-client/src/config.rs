//! Configuration loading for the Sorteio image client.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use chrono::Duration;
use serde::Deserialize;
use sorteio_core::{ConfigError, ReferenceClassifier};
use sorteio_storage::{is_valid_key, CacheConfig};
use std::path::{Path, PathBuf};

use crate::url_builder::DirectUrlBuilder;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Backend base URL. Without it, image URLs are root-relative.
    #[serde(default)]
    pub api_base_url: Option<String>,
    pub request_timeout_ms: u64,
    pub image_endpoint: String,
    pub legacy_prefix: String,
    pub auth: AuthConfig,
    pub cache: CacheSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub bearer_token: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    pub storage_key: String,
    pub ttl_days: i64,
    /// Directory for the JSON file store; in-memory only when absent.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub json: bool,
    /// Filter directives used when `RUST_LOG` is unset.
    #[serde(default)]
    pub filter: Option<String>,
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path(
            std::env::args().skip(1),
            std::env::var(CONFIG_PATH_ENV).ok(),
        );
        Self::load_from(path)
    }

    fn load_from(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.api_base_url {
            if base.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "api_base_url",
                    reason: "must not be empty when set".to_string(),
                });
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        let endpoint = self.image_endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "image_endpoint",
                reason: "must not be empty".to_string(),
            });
        }
        if endpoint.starts_with('/') || endpoint.ends_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "image_endpoint",
                reason: "must not start or end with '/'".to_string(),
            });
        }
        if self.auth.bearer_token.is_none() && self.auth.api_key.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "auth",
                reason: "bearer_token or api_key must be provided".to_string(),
            });
        }
        if !is_valid_key(self.cache.storage_key.trim()) {
            return Err(ConfigError::InvalidValue {
                field: "cache.storage_key",
                reason: "must be non-empty ASCII alphanumerics, '-', '_' or '.', not starting with '.'"
                    .to_string(),
            });
        }
        if self.cache.ttl_days <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_days",
                reason: "must be > 0".to_string(),
            });
        }
        if let Some(dir) = &self.cache.directory {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "cache.directory",
                    reason: "must not be empty when set".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn classifier(&self) -> ReferenceClassifier {
        ReferenceClassifier::new(self.legacy_prefix.clone())
    }

    pub fn url_builder(&self) -> DirectUrlBuilder {
        DirectUrlBuilder::new(
            self.api_base_url.as_deref(),
            &self.image_endpoint,
            self.classifier(),
        )
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_storage_key(self.cache.storage_key.trim())
            .with_ttl(Duration::days(self.cache.ttl_days))
            .with_classifier(self.classifier())
    }
}

const CONFIG_PATH_ENV: &str = "SORTEIO_CONFIG";

/// `--config <path>` wins over the environment variable.
fn config_path(
    args: impl IntoIterator<Item = String>,
    env: Option<String>,
) -> Option<PathBuf> {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return Some(PathBuf::from(path));
            }
        }
    }
    env.filter(|value| !value.trim().is_empty()).map(PathBuf::from)
}
