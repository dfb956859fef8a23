//! Persisted cache entries and their expiry rule.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use sorteio_core::Timestamp;

/// A filename remembered for a reference, stamped with when it was stored.
///
/// Serialized as `{"filename": "...", "storedAt": <epoch millis>}` so the
/// persisted payload stays compatible with caches written by the web
/// client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub filename: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub stored_at: Timestamp,
}

impl CacheEntry {
    pub fn new(filename: impl Into<String>, stored_at: Timestamp) -> Self {
        Self {
            filename: filename.into(),
            stored_at,
        }
    }

    /// How long ago the entry was stored. Never negative.
    pub fn age(&self, now: Timestamp) -> Duration {
        if now > self.stored_at {
            now - self.stored_at
        } else {
            Duration::zero()
        }
    }

    /// An entry is valid while its age is at most `ttl`.
    pub fn is_expired(&self, now: Timestamp, ttl: Duration) -> bool {
        self.age(now) > ttl
    }
}
