// src/wrappers/transform.rs

//! Item transform pipeline.

use std::collections::BTreeMap;

use crate::dataset::Dataset;
use crate::error::Result;
use crate::item::{Item, Key, Payload};
use crate::scope::Scope;

/// One step of a transform pipeline.
///
/// Key-aware transforms receive the queried key alongside the item, e.g. to
/// derive deterministic per-key randomness.
pub enum Transform {
    Plain(Box<dyn Fn(Item) -> Item>),
    Keyed(Box<dyn Fn(&Key, Item) -> Item>),
}

impl Transform {
    pub fn plain(f: impl Fn(Item) -> Item + 'static) -> Self {
        Transform::Plain(Box::new(f))
    }

    pub fn keyed(f: impl Fn(&Key, Item) -> Item + 'static) -> Self {
        Transform::Keyed(Box::new(f))
    }

    fn apply(&self, key: &Key, item: Item) -> Item {
        match self {
            Transform::Plain(f) => f(item),
            Transform::Keyed(f) => f(key, item),
        }
    }
}

/// Passes every queried item through an ordered list of transforms.
///
/// Transforms run in registration order and each one's output replaces the
/// item for the next. More transforms may be appended at any time; they
/// affect only future queries.
pub struct TransformedDataset<D> {
    inner: D,
    transforms: Vec<Transform>,
    overrides: BTreeMap<String, Payload>,
}

impl<D: Dataset> TransformedDataset<D> {
    pub fn new(inner: D) -> Self {
        Self::with_transforms(inner, Vec::new())
    }

    pub fn with_transforms(inner: D, transforms: Vec<Transform>) -> Self {
        Self {
            inner,
            transforms,
            overrides: BTreeMap::new(),
        }
    }

    /// Appends a transform that sees only the item.
    pub fn add_transform(&mut self, f: impl Fn(Item) -> Item + 'static) {
        self.transforms.push(Transform::plain(f));
    }

    /// Appends a transform that sees the key and the item.
    pub fn add_keyed_transform(&mut self, f: impl Fn(&Key, Item) -> Item + 'static) {
        self.transforms.push(Transform::keyed(f));
    }

    /// Adds local scope overrides layered over the inner dataset's scope.
    #[must_use]
    pub fn with_scope_overrides(
        mut self,
        entries: impl IntoIterator<Item = (String, Payload)>,
    ) -> Self {
        self.overrides.extend(entries);
        self
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: Dataset> Dataset for TransformedDataset<D> {
    fn list_keys(&self) -> Result<Vec<Key>> {
        self.inner.list_keys()
    }

    fn query_item(&self, key: &Key) -> Result<Item> {
        let mut item = self.inner.query_item(key)?;
        for transform in &self.transforms {
            item = transform.apply(key, item);
        }
        Ok(item)
    }

    fn scope(&self) -> Scope {
        if self.overrides.is_empty() {
            self.inner.scope()
        } else {
            self.inner.scope().child(self.overrides.clone())
        }
    }
}
