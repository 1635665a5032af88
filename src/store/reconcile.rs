// src/store/reconcile.rs

//! Create-or-reuse orchestration for indexed stores.

use std::path::Path;

use tracing::warn;

use crate::config::ReconcileConfig;
use crate::dataset::Dataset;
use crate::error::{FeedError, Result};
use crate::item::Key;

use super::indexed::IndexedStore;
use super::registry;

/// Options for [`create_or_open`].
pub struct ReconcileOptions {
    /// Keys to materialize; defaults to the dataset's own enumeration.
    pub keys: Option<Vec<Key>>,
    /// Number of leading keys re-verified against the source dataset after
    /// opening. 0 disables the check.
    pub check_first_n: usize,
    /// Delete and re-create an existing store.
    pub overwrite: bool,
    /// Invoked just before a creation actually happens (e.g. to load a
    /// heavyweight source lazily).
    pub before_create: Option<Box<dyn FnOnce()>>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            keys: None,
            check_first_n: 1,
            overwrite: false,
            before_create: None,
        }
    }
}

impl ReconcileOptions {
    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self {
            check_first_n: config.check_first_n,
            overwrite: config.overwrite,
            ..Self::default()
        }
    }
}

/// Why a stored item diverged from its freshly computed counterpart.
struct DiffReason(String);

/// Materializes `dataset` at `path` unless a store already exists there,
/// then opens it for reading.
///
/// A failed creation deletes the partially written file before propagating,
/// so a half-written store is never left at the target path. After opening,
/// the first `check_first_n` keys are recomputed from `dataset` and compared
/// to their stored items by deep equality; a detected mismatch is reported
/// as a warning naming the path and reason, and the store is still returned
/// usable. Staleness detection only reports, it never re-creates.
pub fn create_or_open<D: Dataset + ?Sized>(
    dataset: &D,
    path: impl AsRef<Path>,
    options: ReconcileOptions,
) -> Result<IndexedStore> {
    let path = path.as_ref();
    let ReconcileOptions {
        keys,
        check_first_n,
        overwrite,
        before_create,
    } = options;

    if overwrite && path.exists() {
        registry::close_path(path);
        std::fs::remove_file(path).map_err(|e| {
            FeedError::storage_with_source(path, "failed to delete store for overwrite", e)
        })?;
    }

    let was_existing = path.exists();
    if !was_existing {
        if let Some(callback) = before_create {
            callback();
        }
        if let Err(err) = IndexedStore::create_at(dataset, path, keys.clone()) {
            // Never leave a half-written store at the target path.
            if path.exists() {
                let _ = std::fs::remove_file(path);
            }
            return Err(err);
        }
    }

    let store = IndexedStore::open(path)?;

    if check_first_n > 0 {
        match first_mismatch(dataset, &store, keys, check_first_n) {
            Ok(()) => {}
            Err(DiffReason(reason)) => {
                warn!(
                    path = %path.display(),
                    reason,
                    "materialized store appears to be out of date"
                );
                if !was_existing {
                    warn!(
                        path = %path.display(),
                        "the store was just created; check that query_item is deterministic"
                    );
                }
            }
        }
    }

    Ok(store)
}

/// Compares the first `n` keys' fresh items against their stored items,
/// stopping at the first divergence. Every failure along the way is a
/// divergence with a recorded reason, never a hard error.
fn first_mismatch<D: Dataset + ?Sized>(
    dataset: &D,
    store: &IndexedStore,
    keys: Option<Vec<Key>>,
    n: usize,
) -> std::result::Result<(), DiffReason> {
    let keys = match keys {
        Some(keys) => keys,
        None => dataset
            .list_keys()
            .map_err(|e| DiffReason(format!("could not enumerate source keys: {e}")))?,
    };
    for key in keys.iter().take(n) {
        let fresh = dataset
            .query_item(key)
            .map_err(|e| DiffReason(format!("could not recompute item for key {key}: {e}")))?;
        let stored = match store.query_item(key) {
            Ok(item) => item,
            Err(FeedError::KeyNotFound { key }) => {
                return Err(DiffReason(format!("store does not contain key {key}")));
            }
            Err(e) => {
                return Err(DiffReason(format!(
                    "could not read stored item for key {key}: {e}"
                )));
            }
        };
        if !dataset.items_equal(&fresh, &stored) {
            return Err(DiffReason(format!(
                "stored item for key {key} differs from the source dataset"
            )));
        }
    }
    Ok(())
}
