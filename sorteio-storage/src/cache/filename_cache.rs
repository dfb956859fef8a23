//! Reference-to-filename cache over a persistent backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Duration;
use sorteio_core::{
    Clock, ReferenceClassifier, StorageError, SystemClock, DEFAULT_STORAGE_KEY,
    DEFAULT_TTL_DAYS,
};
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::traits::{CacheStats, PersistentStore};

/// Configuration for the filename cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Backend key holding the serialized persisted map.
    pub storage_key: String,
    /// How long a persisted entry stays valid.
    pub ttl: Duration,
    /// Classifier used to sanitize filenames before they are stored.
    pub classifier: ReferenceClassifier,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            ttl: Duration::days(DEFAULT_TTL_DAYS),
            classifier: ReferenceClassifier::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the classifier used for filename sanitization.
    pub fn with_classifier(mut self, classifier: ReferenceClassifier) -> Self {
        self.classifier = classifier;
        self
    }
}

#[derive(Debug, Default)]
struct CacheState {
    memory: HashMap<String, String>,
    /// `None` until the backend has been read once.
    persisted: Option<HashMap<String, CacheEntry>>,
    stats: CacheStats,
}

/// Two-layer filename cache.
///
/// Share one instance per process (behind an `Arc`). All operations are
/// synchronous and hold the internal lock only for their own duration, so
/// concurrent callers never observe a half-applied mutation.
#[derive(Debug)]
pub struct FilenameCache {
    store: Arc<dyn PersistentStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl FilenameCache {
    /// Create a cache over `store` using the wall clock.
    pub fn new(store: Arc<dyn PersistentStore>, config: CacheConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    /// Create a cache with an explicit time source.
    pub fn with_clock(
        store: Arc<dyn PersistentStore>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Remember that `reference` resolved to `filename`.
    ///
    /// Ignored when either value is blank or the filename does not sanitize
    /// to a valid filename. Returns whether the entry was stored.
    pub fn remember(&self, reference: &str, filename: &str) -> bool {
        let reference = reference.trim();
        if reference.is_empty() || filename.trim().is_empty() {
            return false;
        }
        let Some(filename) = self.config.classifier.candidate_segment(filename) else {
            debug!(reference, filename, "Refusing to cache invalid filename");
            return false;
        };

        let now = self.clock.now();
        let mut state = self.lock();
        state.memory.insert(reference.to_string(), filename.clone());
        self.persisted(&mut state)
            .insert(reference.to_string(), CacheEntry::new(filename.clone(), now));
        self.flush(&mut state);
        debug!(reference, filename = %filename, "Cached image filename");
        true
    }

    /// Look up the filename remembered for `reference`.
    ///
    /// The in-memory layer answers first. A persisted entry older than the
    /// TTL is purged and reported as a miss; a fresh one is promoted into
    /// memory.
    pub fn lookup(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        let mut state = self.lock();
        if let Some(filename) = state.memory.get(reference).cloned() {
            state.stats.memory_hits += 1;
            return Some(filename);
        }

        let now = self.clock.now();
        let ttl = self.config.ttl;
        let persisted = self.persisted(&mut state);
        let (found, expired) = match persisted.get(reference) {
            Some(entry) if entry.is_expired(now, ttl) => (None, true),
            Some(entry) => (Some(entry.filename.clone()), false),
            None => (None, false),
        };

        if expired {
            persisted.remove(reference);
            state.stats.expirations += 1;
            state.stats.misses += 1;
            self.flush(&mut state);
            debug!(reference, "Purged expired filename cache entry");
            return None;
        }

        match found {
            Some(filename) => {
                state.memory.insert(reference.to_string(), filename.clone());
                state.stats.persisted_hits += 1;
                Some(filename)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Drop whatever is remembered for `reference` from both layers.
    ///
    /// Returns whether anything was removed.
    pub fn forget(&self, reference: &str) -> bool {
        let reference = reference.trim();
        if reference.is_empty() {
            return false;
        }

        let mut state = self.lock();
        let in_memory = state.memory.remove(reference).is_some();
        let in_persisted = self.persisted(&mut state).remove(reference).is_some();
        if in_persisted {
            self.flush(&mut state);
        }
        let removed = in_memory || in_persisted;
        if removed {
            state.stats.evictions += 1;
            debug!(reference, "Forgot cached image filename");
        }
        removed
    }

    /// Snapshot of cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut state = self.lock();
        let entry_count = self.persisted(&mut state).len() as u64;
        let mut stats = state.stats.clone();
        stats.entry_count = entry_count;
        stats
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // The cache is best-effort; a panic elsewhere must not disable it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The persisted map, loading it from the backend on first use.
    fn persisted<'a>(&self, state: &'a mut CacheState) -> &'a mut HashMap<String, CacheEntry> {
        state.persisted.get_or_insert_with(|| self.load())
    }

    fn load(&self) -> HashMap<String, CacheEntry> {
        let key = &self.config.storage_key;
        let loaded = self
            .store
            .read(key)
            .and_then(|raw| raw.map(|raw| decode_entries(key, &raw)).transpose());
        match loaded {
            Ok(Some(map)) => {
                debug!(key = %key, entries = map.len(), "Loaded persisted filename cache");
                map
            }
            Ok(None) => HashMap::new(),
            Err(e @ StorageError::Corrupt { .. }) => {
                warn!(error = %e, "Discarding corrupt filename cache");
                HashMap::new()
            }
            Err(e) => {
                warn!(error = %e, "Filename cache storage unavailable");
                HashMap::new()
            }
        }
    }

    /// Rewrite the persisted map; an empty map removes the key.
    fn flush(&self, state: &mut CacheState) {
        let Some(persisted) = state.persisted.as_ref() else {
            return;
        };
        let key = &self.config.storage_key;
        let result = if persisted.is_empty() {
            self.store.remove(key).map_err(|e| e.to_string())
        } else {
            serde_json::to_string(persisted)
                .map_err(|e| e.to_string())
                .and_then(|payload| self.store.write(key, &payload).map_err(|e| e.to_string()))
        };
        if let Err(e) = result {
            state.stats.flush_failures += 1;
            warn!(key = %key, error = %e, "Failed to persist filename cache");
        }
    }
}

fn decode_entries(key: &str, raw: &str) -> Result<HashMap<String, CacheEntry>, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use chrono::{TimeZone, Utc};
    use sorteio_core::Timestamp;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    #[derive(Debug)]
    struct StepClock(AtomicI64);

    impl StepClock {
        fn new() -> Self {
            Self(AtomicI64::new(
                Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap().timestamp_millis(),
            ))
        }

        fn advance(&self, by: Duration) {
            self.0.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> Timestamp {
            Utc.timestamp_millis_opt(self.0.load(Ordering::SeqCst)).unwrap()
        }
    }

    #[derive(Debug, Default)]
    struct CountingStore {
        inner: MemoryStore,
        reads: AtomicUsize,
        writes: AtomicUsize,
        removes: AtomicUsize,
    }

    impl PersistentStore for CountingStore {
        fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.write(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.removes.fetch_add(1, Ordering::SeqCst);
            self.inner.remove(key)
        }
    }

    fn persisted_map(store: &dyn PersistentStore) -> HashMap<String, CacheEntry> {
        store
            .read(DEFAULT_STORAGE_KEY)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
            .unwrap_or_default()
    }

    #[test]
    fn test_remember_then_lookup() {
        let store = Arc::new(MemoryStore::new());
        let cache = FilenameCache::new(store.clone(), CacheConfig::default());

        assert!(cache.remember("ref1", "photo.jpg"));
        assert_eq!(cache.lookup("ref1").as_deref(), Some("photo.jpg"));
        assert_eq!(persisted_map(store.as_ref())["ref1"].filename, "photo.jpg");
    }

    #[test]
    fn test_remember_rejects_blank_and_invalid() {
        let store = Arc::new(MemoryStore::new());
        let cache = FilenameCache::new(store.clone(), CacheConfig::default());

        assert!(!cache.remember("  ", "photo.jpg"));
        assert!(!cache.remember("ref", "   "));
        assert!(!cache.remember("ref", "not a filename!!"));
        assert!(store.is_empty());
        assert_eq!(cache.lookup("ref"), None);
    }

    #[test]
    fn test_remember_sanitizes_filename() {
        let cache = FilenameCache::new(Arc::new(MemoryStore::new()), CacheConfig::default());
        assert!(cache.remember("ref", "uploads/rifa.png?x=1"));
        assert_eq!(cache.lookup("ref").as_deref(), Some("rifa.png"));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(StepClock::new());
        cache_remember_in_previous_session(store.clone(), clock.clone());

        let cache = FilenameCache::with_clock(store.clone(), clock.clone(), CacheConfig::default());
        clock.advance(Duration::days(6));
        assert_eq!(cache.lookup("ref1").as_deref(), Some("photo.jpg"));

        let cache = FilenameCache::with_clock(store.clone(), clock.clone(), CacheConfig::default());
        clock.advance(Duration::days(2));
        assert_eq!(cache.lookup("ref1"), None);
        assert!(!persisted_map(store.as_ref()).contains_key("ref1"));
        assert_eq!(cache.stats().expirations, 1);
    }

    fn cache_remember_in_previous_session(store: Arc<MemoryStore>, clock: Arc<StepClock>) {
        let cache = FilenameCache::with_clock(store, clock, CacheConfig::default());
        assert!(cache.remember("ref1", "photo.jpg"));
    }

    #[test]
    fn test_memory_layer_is_authoritative_within_session() {
        let clock = Arc::new(StepClock::new());
        let cache = FilenameCache::with_clock(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            CacheConfig::default(),
        );
        cache.remember("ref1", "photo.jpg");
        clock.advance(Duration::days(30));
        assert_eq!(cache.lookup("ref1").as_deref(), Some("photo.jpg"));
        assert_eq!(cache.stats().memory_hits, 1);
    }

    #[test]
    fn test_persisted_hit_is_promoted() {
        let store = Arc::new(MemoryStore::new());
        FilenameCache::new(store.clone(), CacheConfig::default()).remember("ref1", "a.png");

        let cache = FilenameCache::new(store, CacheConfig::default());
        assert_eq!(cache.lookup("ref1").as_deref(), Some("a.png"));
        assert_eq!(cache.lookup("ref1").as_deref(), Some("a.png"));
        let stats = cache.stats();
        assert_eq!(stats.persisted_hits, 1);
        assert_eq!(stats.memory_hits, 1);
    }

    #[test]
    fn test_forget_removes_both_layers() {
        let store = Arc::new(MemoryStore::new());
        let cache = FilenameCache::new(store.clone(), CacheConfig::default());
        cache.remember("ref1", "a.png");

        assert!(cache.forget("ref1"));
        assert!(!cache.forget("ref1"));
        assert_eq!(cache.lookup("ref1"), None);
        assert!(persisted_map(store.as_ref()).is_empty());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_backend_is_read_once() {
        let store = Arc::new(CountingStore::default());
        let cache = FilenameCache::new(store.clone(), CacheConfig::default());

        cache.lookup("a");
        cache.remember("b", "b.png");
        cache.lookup("c");
        cache.forget("b");
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(store.removes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_forgetting_last_entry_removes_key() {
        let store = Arc::new(MemoryStore::new());
        let cache = FilenameCache::new(store.clone(), CacheConfig::default());
        cache.remember("a", "a.png");
        cache.remember("b", "b.png");

        cache.forget("a");
        assert_eq!(store.len(), 1);
        cache.forget("b");
        assert!(store.is_empty());
        assert_eq!(cache.stats().flush_failures, 0);
    }

    #[test]
    fn test_corrupt_payload_yields_empty_cache() {
        let store = Arc::new(MemoryStore::with_value(DEFAULT_STORAGE_KEY, "{not json"));
        let cache = FilenameCache::new(store.clone(), CacheConfig::default());

        assert_eq!(cache.lookup("ref1"), None);
        assert!(cache.remember("ref1", "a.png"));
        assert_eq!(persisted_map(store.as_ref()).len(), 1);
    }

    #[test]
    fn test_corrupt_payload_is_reported_as_corrupt() {
        assert!(matches!(
            decode_entries(DEFAULT_STORAGE_KEY, "[1, 2"),
            Err(StorageError::Corrupt { key, .. }) if key == DEFAULT_STORAGE_KEY
        ));
        let decoded =
            decode_entries(DEFAULT_STORAGE_KEY, r#"{"r":{"filename":"a.png","storedAt":0}}"#)
                .unwrap();
        assert_eq!(decoded["r"].filename, "a.png");
    }

    #[test]
    fn test_custom_storage_key() {
        let store = Arc::new(MemoryStore::new());
        let cache = FilenameCache::new(
            store.clone(),
            CacheConfig::new().with_storage_key("tenant-a-images"),
        );
        cache.remember("ref1", "a.png");
        assert!(store.read("tenant-a-images").unwrap().is_some());
        assert!(store.read(DEFAULT_STORAGE_KEY).unwrap().is_none());
    }
}
