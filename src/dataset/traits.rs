// src/dataset/traits.rs

//! The dataset capability contract.
//!
//! Implementers provide the key space (`list_keys`) and random access
//! (`query_item`); batch assembly and epoch iteration are provided on top of
//! those two operations. Wrappers implement the same trait around exactly
//! one inner dataset, so any stack of wrappers is itself a dataset.

use std::collections::HashMap;

use crate::error::{FeedError, Result};
use crate::item::{items_equal, Item, Key, Payload};
use crate::scope::Scope;

use super::batch::Batch;
use super::iterator::{BalancedBatches, Batches};

/// A keyed, randomly-addressable dataset.
pub trait Dataset {
    /// Enumerates the key space. Order is implementation-defined unless a
    /// wrapper states otherwise.
    ///
    /// Enumeration is fallible because wrappers may have to consult their
    /// inner dataset to derive their own key space.
    fn list_keys(&self) -> Result<Vec<Key>>;

    /// Fetches the item for one key.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is absent.
    fn query_item(&self, key: &Key) -> Result<Item>;

    /// The contextual scope this dataset carries. Empty by default; wrappers
    /// layer their own overrides over the inner dataset's scope.
    fn scope(&self) -> Scope {
        Scope::new()
    }

    /// Assembles one batch from the items of `keys`, in order.
    ///
    /// The first key's item determines the arity; each tuple position
    /// becomes one column of length `keys.len()`. Performs exactly one
    /// `query_item` call per key.
    ///
    /// # Errors
    ///
    /// Returns `EmptyBatch` for an empty key list (the arity cannot be
    /// inferred), and a dataset error if a later item disagrees on arity.
    fn query(&self, keys: &[Key]) -> Result<Batch> {
        let (first_key, rest) = keys.split_first().ok_or(FeedError::EmptyBatch)?;
        let first = self.query_item(first_key)?;
        let width = first.len();
        let mut columns: Vec<Vec<Payload>> =
            (0..width).map(|_| Vec::with_capacity(keys.len())).collect();
        for (position, payload) in first.into_iter().enumerate() {
            columns[position].push(payload);
        }
        for key in rest {
            let item = self.query_item(key)?;
            if item.len() != width {
                return Err(FeedError::dataset(format!(
                    "item arity mismatch for key {key}: expected {width}, got {}",
                    item.len()
                )));
            }
            for (position, payload) in item.into_iter().enumerate() {
                columns[position].push(payload);
            }
        }
        Ok(Batch::from_columns(columns))
    }

    /// Lazily yields one epoch of batches over `keys`.
    ///
    /// Shuffling, if any, is the caller's responsibility and must happen
    /// before this call.
    fn batches(&self, keys: Vec<Key>, batch_size: usize) -> Batches<'_, Self> {
        Batches::new(self, keys, batch_size)
    }

    /// Lazily yields group-balanced batches: each batch takes
    /// `batch_size / key_groups.len()` keys from every group, preserving
    /// group order within the batch.
    ///
    /// # Errors
    ///
    /// Returns `EvenSplitRequired` when the group count does not evenly
    /// divide `batch_size`.
    fn balanced_batches(
        &self,
        key_groups: Vec<Vec<Key>>,
        batch_size: usize,
    ) -> Result<BalancedBatches<'_, Self>> {
        BalancedBatches::new(self, key_groups, batch_size)
    }

    /// Deep structural equality between two items, used by reconciliation.
    fn items_equal(&self, a: &Item, b: &Item) -> bool {
        items_equal(a, b)
    }
}

/// A simple in-memory dataset over an ordered key/item map.
///
/// Mostly an example implementation and a test fixture; `list_keys` returns
/// keys in insertion order.
pub struct MapDataset {
    entries: Vec<(Key, Item)>,
    index: HashMap<Key, usize>,
    scope: Scope,
}

impl MapDataset {
    /// Builds the dataset from `(key, item)` pairs. A repeated key replaces
    /// the earlier item and keeps its original position.
    pub fn new(entries: impl IntoIterator<Item = (Key, Item)>) -> Self {
        let mut stored: Vec<(Key, Item)> = Vec::new();
        let mut index = HashMap::new();
        for (key, item) in entries {
            match index.get(&key) {
                Some(&at) => stored[at] = (key, item),
                None => {
                    index.insert(key.clone(), stored.len());
                    stored.push((key, item));
                }
            }
        }
        Self {
            entries: stored,
            index,
            scope: Scope::new(),
        }
    }

    /// Attaches a scope to this dataset.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Dataset for MapDataset {
    fn list_keys(&self) -> Result<Vec<Key>> {
        Ok(self.entries.iter().map(|(key, _)| key.clone()).collect())
    }

    fn query_item(&self, key: &Key) -> Result<Item> {
        let at = *self
            .index
            .get(key)
            .ok_or_else(|| FeedError::key_not_found(key.clone()))?;
        Ok(self.entries[at].1.clone())
    }

    fn scope(&self) -> Scope {
        self.scope.clone()
    }
}
