//! Error types for the client.

use crate::api_client::ApiClientError;
use sorteio_core::ConfigError;
use sorteio_storage::FileStoreError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiClientError),
    #[error("Cache storage error: {0}")]
    Storage(#[from] FileStoreError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}
