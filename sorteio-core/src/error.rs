//! Error types for Sorteio operations

use thiserror::Error;

/// Persistent storage errors.
///
/// The filename cache never surfaces these to resolver callers; they are
/// logged and swallowed. Backends still report them so tests and the CLI
/// can see what went wrong.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Failed to read storage key {key}: {reason}")]
    Read { key: String, reason: String },

    #[error("Failed to write storage key {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("Corrupt payload under storage key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Authenticated image fetch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport failure: {reason}")]
    Http { reason: String },

    #[error("Image endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid image path: {path}")]
    InvalidPath { path: String },
}

impl FetchError {
    /// Returns true when the backend reported the image as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or SORTEIO_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

// =============================================================================
// TESTS
// =============================================================================
