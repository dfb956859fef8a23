//! JSON file storage backend.
//!
//! Each key maps to `<root>/<key>.json`. Writes go to a uniquely named
//! temporary file in the same directory and are renamed into place, so a
//! crash mid-write leaves either the old payload or the new one, and two
//! processes sharing a root never write through the same temporary file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sorteio_core::StorageError;
use tempfile::NamedTempFile;

use super::traits::PersistentStore;

/// Error type for opening a file store.
#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    /// The root path exists but is not a directory.
    #[error("Storage root is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory-backed key-value store.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, FileStoreError> {
        let root = root.as_ref().to_path_buf();
        if root.exists() && !root.is_dir() {
            return Err(FileStoreError::NotADirectory(root));
        }
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, String> {
        if !is_valid_key(key) {
            return Err(format!("invalid storage key {:?}", key));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

/// Whether `key` can name a file in the store: ASCII alphanumerics, `-`,
/// `_` and `.`, not starting with a dot.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn write_and_sync(file: &mut NamedTempFile, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes)?;
    file.as_file().sync_all()
}

impl PersistentStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key).map_err(|reason| StorageError::Read {
            key: key.to_string(),
            reason,
        })?;
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| StorageError::Read {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let to_error = |reason: String| StorageError::Write {
            key: key.to_string(),
            reason,
        };
        let path = self.path_for(key).map_err(to_error)?;
        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| to_error(e.to_string()))?;
        write_and_sync(&mut tmp, value.as_bytes()).map_err(|e| to_error(e.to_string()))?;
        tmp.persist(&path)
            .map(|_| ())
            .map_err(|e| to_error(e.error.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key).map_err(|reason| StorageError::Write {
            key: key.to_string(),
            reason,
        })?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
