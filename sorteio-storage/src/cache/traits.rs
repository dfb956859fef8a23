//! Storage backend trait and cache statistics.

use sorteio_core::StorageError;

/// Key-value backend holding serialized cache payloads.
///
/// This trait abstracts over where the persisted cache lives (a JSON file
/// on disk, process memory, browser storage behind an FFI bridge). Values
/// are opaque strings; the cache owns the serialization format.
///
/// Implementations must be thread-safe. Writes replace the whole value for
/// a key; there are no partial updates.
pub trait PersistentStore: Send + Sync + std::fmt::Debug {
    /// Read the value stored under `key`, or `None` if nothing is stored.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value stored under `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Statistics about filename cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered by the in-memory layer.
    pub memory_hits: u64,
    /// Lookups answered by the persisted layer (and promoted to memory).
    pub persisted_hits: u64,
    /// Lookups that found nothing usable.
    pub misses: u64,
    /// Persisted entries purged because they outlived the TTL.
    pub expirations: u64,
    /// Entries removed through `forget`.
    pub evictions: u64,
    /// Persisted map writes that the backend rejected.
    pub flush_failures: u64,
    /// Number of entries currently in the persisted layer.
    pub entry_count: u64,
}

impl CacheStats {
    /// Total hits across both layers.
    pub fn hits(&self) -> u64 {
        self.memory_hits + self.persisted_hits
    }

    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}
