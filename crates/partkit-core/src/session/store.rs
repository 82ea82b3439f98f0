//! Object storage backends.

use crate::PartkitError;
use crate::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

/// Key-value object storage used for session payloads.
///
/// Implementations must be safe to share across threads. Each key belongs to
/// one session; [`ObjectStore::put_if_absent`] settles races on that key.
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key`, replacing any existing object.
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Fetches the object under `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no object exists.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Returns whether an object exists under `key`.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Stores `bytes` under `key` only if no object exists there yet.
    ///
    /// The check and the write are one atomic step: when several callers
    /// race on the same key, exactly one of them gets `true`.
    fn put_if_absent(&self, key: &str, bytes: Vec<u8>) -> Result<bool>;
}

/// In-process object store.
///
/// # Examples
///
/// ```
/// use partkit_core::session::MemoryObjectStore;
/// use partkit_core::session::ObjectStore;
///
/// let store = MemoryObjectStore::new();
/// store.put("sessions/a/input", b"bytes".to_vec()).unwrap();
/// assert_eq!(store.get("sessions/a/input").unwrap(), b"bytes");
/// assert!(store.get("sessions/a/output").is_err());
/// ```
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.objects.lock().insert(key.to_string(), bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| PartkitError::NotFound {
                key: key.to_string(),
            })
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.lock().contains_key(key))
    }

    fn put_if_absent(&self, key: &str, bytes: Vec<u8>) -> Result<bool> {
        match self.objects.lock().entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(bytes);
                Ok(true)
            }
        }
    }
}

/// Directory-backed object store.
///
/// Keys map to relative paths under the root. Keys that are absolute or
/// contain `..` are rejected.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = key.is_empty()
            || key.contains('\\')
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(PartkitError::SessionNotFound {
                reference: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        std::fs::read(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                PartkitError::NotFound {
                    key: key.to_string(),
                }
            } else {
                PartkitError::Io(e)
            }
        })
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.object_path(key)?.is_file())
    }

    fn put_if_absent(&self, key: &str, bytes: Vec<u8>) -> Result<bool> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = file.write_all(&bytes) {
            drop(file);
            // Leave no half-written object behind to block a retry.
            let _ = std::fs::remove_file(&path);
            return Err(e.into());
        }
        Ok(true)
    }
}
