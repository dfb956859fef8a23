//! Two-layer filename cache with lazy expiry.
//!
//! The cache maps an original image reference to the filename the backend
//! confirmed for it. Two layers share one key space:
//!
//! - an in-memory map, authoritative for the lifetime of the process and
//!   checked first;
//! - a persisted map of [`CacheEntry`] values, loaded from a
//!   [`PersistentStore`] on first access and rewritten in full on every
//!   mutation.
//!
//! Persisted entries older than the configured TTL are purged when they are
//! looked up. Nothing sweeps them proactively.
//!
//! # Failure Policy
//!
//! Caching is best-effort. A backend that cannot be read yields an empty
//! map; a backend that cannot be written keeps the in-memory state. Neither
//! case is surfaced to callers, only logged and counted in [`CacheStats`].
//!
//! # Example
//!
//! ```ignore
//! let cache = FilenameCache::new(Arc::new(MemoryStore::new()), CacheConfig::default());
//! cache.remember("uploads/rifa.png", "rifa-7f3a.png");
//! assert_eq!(cache.lookup("uploads/rifa.png").as_deref(), Some("rifa-7f3a.png"));
//! ```

pub mod entry;
pub mod file_backend;
pub mod filename_cache;
pub mod memory_backend;
pub mod traits;

pub use entry::CacheEntry;
pub use file_backend::{is_valid_key, FileStore, FileStoreError};
pub use filename_cache::{CacheConfig, FilenameCache};
pub use memory_backend::MemoryStore;
pub use traits::{CacheStats, PersistentStore};
