//! Sorteio Test Utilities
//!
//! Shared test infrastructure for the Sorteio workspace:
//! - Scripted image fetcher with call counting and gated responses
//! - Manually driven clock for cache expiry
//! - Storage backend that fails on demand
//! - Fixtures and proptest generators for references

pub use sorteio_core::{
    Clock, FetchError, FetchedImage, ImageFetcher, StorageError, Timestamp,
};
pub use sorteio_storage::{MemoryStore, PersistentStore};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

// ============================================================================
// MOCK IMAGE FETCHER
// ============================================================================

/// Holds a scripted response until opened.
#[derive(Debug, Clone)]
pub struct Gate {
    tx: watch::Sender<bool>,
}

impl Gate {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Release every fetch waiting on this gate, now and later.
    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close here.
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[derive(Debug, Clone)]
struct Script {
    result: Result<FetchedImage, FetchError>,
    gate: Option<Gate>,
}

/// Image fetcher that answers from a script.
///
/// Unscripted paths answer HTTP 404, like the real image endpoint does for
/// unknown files.
#[derive(Debug, Default)]
pub struct MockImageFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
    total: AtomicUsize,
}

impl MockImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `path` with `image`.
    pub fn respond(&self, path: impl Into<String>, image: FetchedImage) {
        self.script(path.into(), Ok(image), None);
    }

    /// Answer `path` with `error`.
    pub fn fail(&self, path: impl Into<String>, error: FetchError) {
        self.script(path.into(), Err(error), None);
    }

    /// Answer `path` with `image`, but only once the returned gate is opened.
    pub fn respond_gated(&self, path: impl Into<String>, image: FetchedImage) -> Gate {
        let gate = Gate::new();
        self.script(path.into(), Ok(image), Some(gate.clone()));
        gate
    }

    /// Answer `path` with `error`, but only once the returned gate is opened.
    pub fn fail_gated(&self, path: impl Into<String>, error: FetchError) -> Gate {
        let gate = Gate::new();
        self.script(path.into(), Err(error), Some(gate.clone()));
        gate
    }

    /// Total number of fetches issued.
    pub fn call_count(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Number of fetches issued for `path`.
    pub fn calls_for(&self, path: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.iter().filter(|p| p.as_str() == path).count())
            .unwrap_or(0)
    }

    /// Every path fetched, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn script(&self, path: String, result: Result<FetchedImage, FetchError>, gate: Option<Gate>) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(path, Script { result, gate });
        }
    }
}

#[async_trait]
impl ImageFetcher for MockImageFetcher {
    async fn fetch_image(&self, path: &str) -> Result<FetchedImage, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(path.to_string());
        }

        let script = self
            .scripts
            .lock()
            .ok()
            .and_then(|scripts| scripts.get(path).cloned());
        let Some(script) = script else {
            return Err(not_found());
        };
        if let Some(gate) = &script.gate {
            gate.wait().await;
        }
        script.result
    }
}

// ============================================================================
// CLOCK
// ============================================================================

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(fixed_epoch())
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(now: Timestamp) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn set(&self, to: Timestamp) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| fixed_epoch())
    }
}

// ============================================================================
// STORAGE
// ============================================================================

/// Backend that can be told to reject reads and/or writes.
///
/// Successful operations pass through to an inner [`MemoryStore`].
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FailingStore {
    /// A store whose writes all fail (quota exceeded, private mode).
    pub fn rejecting_writes() -> Self {
        let store = Self::default();
        store.set_fail_writes(true);
        store
    }

    /// A store that cannot be read at all.
    pub fn unreadable() -> Self {
        let store = Self::default();
        store.set_fail_reads(true);
        store
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl PersistentStore for FailingStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Read {
                key: key.to_string(),
                reason: "storage unavailable".to_string(),
            });
        }
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                key: key.to_string(),
                reason: "quota exceeded".to_string(),
            });
        }
        self.inner.write(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                key: key.to_string(),
                reason: "quota exceeded".to_string(),
            });
        }
        self.inner.remove(key)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// 2024-03-01T00:00:00Z, the instant every [`ManualClock`] starts at.
pub fn fixed_epoch() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// The 404 the image endpoint returns for unknown files.
pub fn not_found() -> FetchError {
    FetchError::Status {
        status: 404,
        body: "Not Found".to_string(),
    }
}

/// A PNG signature followed by a few bytes; enough to stand in for an image.
pub fn sample_png() -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D]
}

/// A fetched PNG without a filename hint.
pub fn png_image() -> FetchedImage {
    FetchedImage::new(sample_png()).with_content_type("image/png")
}

/// A fetched PNG whose response confirms `filename`.
pub fn png_image_named(filename: &str) -> FetchedImage {
    png_image().with_content_disposition(format!("inline; filename=\"{}\"", filename))
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use proptest::prelude::*;

    /// Filenames the backend would accept.
    pub fn arb_filename() -> impl Strategy<Value = String> {
        ("[a-zA-Z0-9_-]{1,16}", prop::sample::select(vec!["png", "jpg", "jpeg", "webp", "gif"]))
            .prop_map(|(name, ext)| format!("{}.{}", name, ext))
    }

    /// References that are already displayable URLs.
    pub fn arb_direct_url() -> impl Strategy<Value = String> {
        (
            prop::sample::select(vec!["http://", "https://", "HTTPS://", "data:", "blob:", "/"]),
            "[a-z0-9./_-]{0,32}",
        )
            .prop_map(|(scheme, rest)| format!("{}{}", scheme, rest))
    }

    /// References with characters no filename may contain and no extension.
    pub fn arb_garbage_reference() -> impl Strategy<Value = String> {
        "[a-z]{1,8}( [a-z!]{1,8}){1,3}"
    }
}
