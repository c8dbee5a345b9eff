//! Document stores for the tool registry and reflection history.
//!
//! A store persists a whole ordered collection at once. `load` on a store
//! that has never been written yields an empty collection; a store that
//! exists but cannot be read or parsed is an error.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("corrupt document store {path}: {message}")]
    Corrupt { path: String, message: String },
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serde(e.to_string())
    }
}

pub trait DocumentStore<T>: Send + Sync {
    fn load(&self) -> Result<Vec<T>, StoreError>;
    fn save(&self, items: &[T]) -> Result<(), StoreError>;
    fn describe(&self) -> String;
}

impl<T, S> DocumentStore<T> for std::sync::Arc<S>
where
    S: DocumentStore<T> + ?Sized,
{
    fn load(&self) -> Result<Vec<T>, StoreError> {
        (**self).load()
    }

    fn save(&self, items: &[T]) -> Result<(), StoreError> {
        (**self).save(items)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// JSON array on disk, replaced atomically on every save.
pub struct JsonFileStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

impl<T> DocumentStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Vec<T>, StoreError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&data).map_err(|e| StoreError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn save(&self, items: &[T]) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let data = serde_json::to_vec_pretty(items)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(&data).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Volatile store; `fail_writes` simulates a full disk.
pub struct InMemoryStore<T> {
    items: Mutex<Vec<T>>,
    fail_writes: AtomicBool,
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        }
    }
}

impl<T: Clone> InMemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

impl<T: Clone + Send> DocumentStore<T> for InMemoryStore<T> {
    fn load(&self) -> Result<Vec<T>, StoreError> {
        self.items
            .lock()
            .map(|i| i.clone())
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    fn save(&self, items: &[T]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        let mut guard = self
            .items
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))?;
        *guard = items.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
