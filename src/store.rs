//! Object storage for uploaded images.
//!
//! The [`ObjectStore`] trait is the seam between the upload workflow and
//! wherever bytes actually live. Keys are `/`-separated relative paths such
//! as `cars/user-42/1700000000-00-1a2b3c4d-front.jpg`.
//!
//! The shipped implementation is [`FsStore`], which maps keys onto a
//! directory tree. Tests use the in-memory `MemoryStore` defined in this
//! module's test section.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object key: {0:?}")]
    InvalidKey(String),
}

/// A flat key → bytes store.
pub trait ObjectStore: Sync {
    /// Store `bytes` under `key`, replacing any existing object.
    fn put(&self, key: &str, bytes: &[u8], media_type: &str) -> Result<(), StoreError>;

    /// Remove the object at `key`. Missing objects yield [`StoreError::NotFound`].
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Keys under `prefix`, sorted. The prefix names a directory: `cars/u1`
    /// matches `cars/u1/a.jpg` but not `cars/u10/a.jpg`.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Reject keys that could escape the store root or alias another key.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad {
        Err(StoreError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

/// Store backed by a local directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, s| p.join(s)))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Option<Vec<&str>> = relative.iter().map(|s| s.to_str()).collect();
        Some(segments?.join("/"))
    }
}

impl ObjectStore for FsStore {
    /// The filesystem keeps no media type; readers infer it from the extension.
    fn put(&self, key: &str, bytes: &[u8], _media_type: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let start = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.path_for(prefix.trim_end_matches('/'))?
        };
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&start) {
            let entry = entry.map_err(|e| {
                StoreError::Io(e.into_io_error().unwrap_or_else(|| {
                    io::Error::other(format!("failed while walking {}", start.display()))
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(key) = self.key_for(entry.path()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
