// src/wrappers/order.rs

//! Access-order optimization for batch queries.

use crate::dataset::{Batch, Dataset};
use crate::error::{FeedError, Result};
use crate::item::{Item, Key};
use crate::scope::Scope;

/// Reorders each incoming `query` key list by a caller-supplied ordering key
/// before delegating, then restores the caller's row order in the assembled
/// batch.
///
/// Two orderings cover the common cases: [`OrderedQueries::by_key`] sorts by
/// the keys themselves, which groups derived keys under their root and keeps
/// an augmentation cache warm; `IndexedStore::query_order` supplies a
/// byte-offset ordering that turns random store reads into a forward sweep.
/// Positional correspondence between input keys and output rows is always
/// preserved.
pub struct OrderedQueries<D, F> {
    inner: D,
    sort_key: F,
}

impl<D: Dataset, F: Fn(&Key) -> Key> OrderedQueries<D, F> {
    pub fn new(inner: D, sort_key: F) -> Self {
        Self { inner, sort_key }
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: Dataset> OrderedQueries<D, fn(&Key) -> Key> {
    /// Orders queries by the natural ordering of the keys themselves.
    pub fn by_key(inner: D) -> Self {
        Self::new(inner, Key::clone as fn(&Key) -> Key)
    }
}

impl<D: Dataset, F: Fn(&Key) -> Key> Dataset for OrderedQueries<D, F> {
    fn list_keys(&self) -> Result<Vec<Key>> {
        self.inner.list_keys()
    }

    fn query_item(&self, key: &Key) -> Result<Item> {
        self.inner.query_item(key)
    }

    fn query(&self, keys: &[Key]) -> Result<Batch> {
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by_key(|&i| (self.sort_key)(&keys[i]));
        let sorted: Vec<Key> = order.iter().map(|&i| keys[i].clone()).collect();
        let batch = self.inner.query(&sorted)?;

        // Row at sorted position p belongs at original position order[p].
        let mut restore = vec![0usize; order.len()];
        for (sorted_pos, &original_pos) in order.iter().enumerate() {
            restore[original_pos] = sorted_pos;
        }
        batch
            .gather(&restore)
            .ok_or_else(|| FeedError::dataset("failed to restore batch row order"))
    }

    fn scope(&self) -> Scope {
        self.inner.scope()
    }
}
