//! Ephemeral object URLs for fetched image bytes.
//!
//! When the backend does not confirm a stable filename, the fetched bytes
//! are parked in a process-local registry under a `blob:` URL. The URL is
//! owned by an [`ObjectUrl`] guard; dropping the guard revokes it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

const OBJECT_URL_PREFIX: &str = "blob:sorteio/";

/// Bytes behind an object URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBlob {
    pub bytes: Arc<Vec<u8>>,
    pub content_type: Option<String>,
}

/// Registry of live object URLs.
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct ObjectUrlRegistry {
    blobs: Arc<Mutex<HashMap<String, ObjectBlob>>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `bytes` under a fresh object URL.
    pub fn create(&self, bytes: Vec<u8>, content_type: Option<String>) -> ObjectUrl {
        let url = format!("{}{}", OBJECT_URL_PREFIX, Uuid::now_v7());
        self.lock().insert(
            url.clone(),
            ObjectBlob {
                bytes: Arc::new(bytes),
                content_type,
            },
        );
        ObjectUrl {
            url,
            registry: self.clone(),
        }
    }

    /// Bytes behind a live object URL.
    pub fn get(&self, url: &str) -> Option<ObjectBlob> {
        self.lock().get(url).cloned()
    }

    /// Number of object URLs not yet released.
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn revoke(&self, url: &str) -> bool {
        self.lock().remove(url).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ObjectBlob>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owning handle for an object URL. Revokes the URL when dropped.
#[derive(Debug)]
pub struct ObjectUrl {
    url: String,
    registry: ObjectUrlRegistry,
}

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl AsRef<str> for ObjectUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        if self.registry.revoke(&self.url) {
            tracing::trace!(url = %self.url, "Released object URL");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_get_and_release() {
        let registry = ObjectUrlRegistry::new();
        let handle = registry.create(vec![1, 2, 3], Some("image/png".to_string()));
        assert!(handle.as_str().starts_with("blob:sorteio/"));
        assert_eq!(registry.live_count(), 1);

        let blob = registry.get(handle.as_str()).unwrap();
        assert_eq!(*blob.bytes, vec![1, 2, 3]);
        assert_eq!(blob.content_type.as_deref(), Some("image/png"));

        let url = handle.as_str().to_string();
        drop(handle);
        assert_eq!(registry.live_count(), 0);
        assert!(registry.get(&url).is_none());
    }

    #[test]
    fn test_urls_are_unique() {
        let registry = ObjectUrlRegistry::new();
        let a = registry.create(vec![], None);
        let b = registry.create(vec![], None);
        assert_ne!(a.as_str(), b.as_str());
        assert_eq!(registry.live_count(), 2);
    }
}
