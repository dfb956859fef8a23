//! Sorteio Storage - Filename Cache and Storage Backends
//!
//! Remembers which real filename an image reference resolved to, so the
//! client can build a direct URL instead of repeating an authenticated
//! fetch. The cache survives restarts through a pluggable key-value
//! backend.

pub mod cache;

pub use cache::{
    is_valid_key, CacheConfig, CacheEntry, CacheStats, FileStore, FileStoreError, FilenameCache,
    MemoryStore, PersistentStore,
};
