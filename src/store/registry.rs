// src/store/registry.rs

//! Process-wide registry of open store handles, one per path.
//!
//! Opening a store for a path closes and replaces any previously tracked
//! handle for that same path, so at most one handle is live per file. The
//! earlier store object keeps existing but its reads fail with a storage
//! error. Teardown is explicit: handles deregister on close or drop.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::warn;

use crate::error::{FeedError, Result};

/// A registry-tracked read handle on a store file.
#[derive(Debug)]
pub struct StoreHandle {
    path: PathBuf,
    file: Mutex<Option<BufReader<File>>>,
}

impl StoreHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.file.lock().unwrap().is_none()
    }

    /// Runs `f` with the underlying reader.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the handle was invalidated by a later
    /// open of the same path.
    pub(crate) fn with_reader<T>(
        &self,
        f: impl FnOnce(&mut BufReader<File>) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.file.lock().unwrap();
        match guard.as_mut() {
            Some(reader) => f(reader),
            None => Err(FeedError::storage(
                &self.path,
                "store handle was invalidated by a later open of the same path",
            )),
        }
    }

    fn close(&self) {
        *self.file.lock().unwrap() = None;
    }
}

static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Arc<StoreHandle>>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<PathBuf, Arc<StoreHandle>>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// The registry key for a path. Canonicalization collapses distinct
/// spellings of the same file; paths that do not resolve (not created yet)
/// key by their literal form.
fn registry_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Registers a freshly opened reader for `path`, closing any previously
/// tracked handle for the same path.
pub(crate) fn register(path: &Path, reader: BufReader<File>) -> Arc<StoreHandle> {
    let key = registry_key(path);
    let handle = Arc::new(StoreHandle {
        path: path.to_path_buf(),
        file: Mutex::new(Some(reader)),
    });
    if let Some(previous) = registry().lock().unwrap().insert(key, handle.clone()) {
        previous.close();
        warn!(path = %path.display(), "closed previous store handle for path");
    }
    handle
}

/// Closes and forgets the tracked handle for `path`, if any. Used before
/// deleting or overwriting a store file.
pub(crate) fn close_path(path: &Path) {
    if let Some(previous) = registry().lock().unwrap().remove(&registry_key(path)) {
        previous.close();
    }
}

/// Closes `handle` and removes it from the registry unless a later open has
/// already replaced it.
pub(crate) fn release(handle: &Arc<StoreHandle>) {
    let key = registry_key(handle.path());
    let mut map = registry().lock().unwrap();
    if map
        .get(&key)
        .is_some_and(|current| Arc::ptr_eq(current, handle))
    {
        map.remove(&key);
    }
    drop(map);
    handle.close();
}
