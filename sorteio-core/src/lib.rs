//! Sorteio Core - Image Reference Types
//!
//! Pure building blocks shared by the storage and client crates:
//! error taxonomy, clock abstraction, reference classification,
//! Content-Disposition parsing and the image fetch trait. Nothing in this
//! crate performs I/O.

use chrono::{DateTime, Utc};

pub mod clock;
pub mod disposition;
pub mod error;
pub mod fetch;
pub mod reference;

pub use clock::{Clock, SystemClock};
pub use disposition::parse_disposition_filename;
pub use error::{ConfigError, FetchError, StorageError};
pub use fetch::{FetchedImage, ImageFetcher};
pub use reference::{is_direct_url, is_valid_filename, Classification, ReferenceClassifier};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Storage key under which the persisted filename cache lives.
pub const DEFAULT_STORAGE_KEY: &str = "secure-image-filename-cache-v1";

/// Number of days a persisted cache entry stays valid.
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// Backend path serving item images, relative to the API base URL.
pub const DEFAULT_IMAGE_ENDPOINT: &str = "item/img";

/// Historical path segment older records prepend to image filenames.
pub const DEFAULT_LEGACY_PREFIX: &str = "uploads/";
