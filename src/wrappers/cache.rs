// src/wrappers/cache.rs

//! Item caches: a single-slot cache for repeated queries of the same key,
//! and a full memoizing cache that can outlive its inner dataset.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::dataset::Dataset;
use crate::error::{FeedError, Result};
use crate::item::{Item, Key};
use crate::scope::Scope;

/// Caches the most recently queried `(key, item)` pair.
///
/// Intended for pipelines where consecutive queries repeat the same key,
/// e.g. several derived keys resolving to one root item. An optional hook
/// runs after every cache miss.
pub struct LastItemCache<D> {
    inner: D,
    slot: RefCell<Option<(Key, Item)>>,
    after_miss: Option<Box<dyn Fn(&Key, &Item)>>,
}

impl<D: Dataset> LastItemCache<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            slot: RefCell::new(None),
            after_miss: None,
        }
    }

    /// Registers a hook invoked after each cache miss, once the slot holds
    /// the freshly computed item.
    #[must_use]
    pub fn with_after_cache_miss(mut self, hook: impl Fn(&Key, &Item) + 'static) -> Self {
        self.after_miss = Some(Box::new(hook));
        self
    }
}

impl<D: Dataset> Dataset for LastItemCache<D> {
    fn list_keys(&self) -> Result<Vec<Key>> {
        self.inner.list_keys()
    }

    fn query_item(&self, key: &Key) -> Result<Item> {
        if let Some((cached_key, item)) = self.slot.borrow().as_ref() {
            if cached_key == key {
                return Ok(item.clone());
            }
        }
        let item = self.inner.query_item(key)?;
        *self.slot.borrow_mut() = Some((key.clone(), item.clone()));
        if let Some(hook) = &self.after_miss {
            hook(key, &item);
        }
        Ok(item)
    }

    fn scope(&self) -> Scope {
        self.inner.scope()
    }
}

/// A full key→item cache populated lazily on first query; never evicts.
///
/// [`MemoCache::fill_forget`] eagerly queries every inner key and then drops
/// the inner dataset, leaving a fully self-contained read-only dataset whose
/// key space is the set of cached keys. A cache miss after that point is a
/// `StaleIndex` fault and should be unreachable when the enumeration was
/// complete.
pub struct MemoCache<D> {
    inner: Option<D>,
    cache: RefCell<HashMap<Key, Item>>,
    // First-touch key order, which becomes the key enumeration order after
    // the inner dataset is forgotten.
    order: RefCell<Vec<Key>>,
}

impl<D: Dataset> MemoCache<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner: Some(inner),
            cache: RefCell::new(HashMap::new()),
            order: RefCell::new(Vec::new()),
        }
    }

    /// Queries every inner key into the cache, then releases the inner
    /// dataset. Afterwards `list_keys` enumerates exactly the cached keys.
    pub fn fill_forget(&mut self) -> Result<()> {
        if let Some(inner) = &self.inner {
            for key in inner.list_keys()? {
                self.query_item(&key)?;
            }
        }
        self.inner = None;
        Ok(())
    }

    /// Whether the inner dataset has been released.
    pub fn is_frozen(&self) -> bool {
        self.inner.is_none()
    }
}

impl<D: Dataset> Dataset for MemoCache<D> {
    fn list_keys(&self) -> Result<Vec<Key>> {
        match &self.inner {
            Some(inner) => inner.list_keys(),
            None => Ok(self.order.borrow().clone()),
        }
    }

    fn query_item(&self, key: &Key) -> Result<Item> {
        if let Some(item) = self.cache.borrow().get(key) {
            return Ok(item.clone());
        }
        let inner = self
            .inner
            .as_ref()
            .ok_or_else(|| FeedError::stale_index(key.clone()))?;
        let item = inner.query_item(key)?;
        self.order.borrow_mut().push(key.clone());
        self.cache.borrow_mut().insert(key.clone(), item.clone());
        Ok(item)
    }

    fn scope(&self) -> Scope {
        match &self.inner {
            Some(inner) => inner.scope(),
            None => Scope::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MapDataset;
    use crate::item::Payload;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counting {
        inner: MapDataset,
        calls: Rc<Cell<usize>>,
    }

    impl Counting {
        fn new(inner: MapDataset) -> (Self, Rc<Cell<usize>>) {
            let calls = Rc::new(Cell::new(0));
            (
                Self {
                    inner,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl Dataset for Counting {
        fn list_keys(&self) -> Result<Vec<Key>> {
            self.inner.list_keys()
        }

        fn query_item(&self, key: &Key) -> Result<Item> {
            self.calls.set(self.calls.get() + 1);
            self.inner.query_item(key)
        }
    }

    fn numbered(n: i64) -> MapDataset {
        MapDataset::new((0..n).map(|i| (Key::from(i), vec![Payload::Int(i)])))
    }

    #[test]
    fn test_last_item_cache_hits_on_repeated_key() {
        let (counting, calls) = Counting::new(numbered(3));
        let cache = LastItemCache::new(counting);

        let a = cache.query_item(&Key::from(1)).unwrap();
        let b = cache.query_item(&Key::from(1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(calls.get(), 1);

        // A different key overwrites the slot.
        cache.query_item(&Key::from(2)).unwrap();
        assert_eq!(calls.get(), 2);
        cache.query_item(&Key::from(1)).unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_last_item_cache_miss_hook() {
        let misses = Rc::new(Cell::new(0));
        let seen = misses.clone();
        let cache =
            LastItemCache::new(numbered(3)).with_after_cache_miss(move |_, _| {
                seen.set(seen.get() + 1);
            });

        cache.query_item(&Key::from(0)).unwrap();
        cache.query_item(&Key::from(0)).unwrap();
        cache.query_item(&Key::from(1)).unwrap();
        assert_eq!(misses.get(), 2);
    }

    #[test]
    fn test_memo_cache_queries_inner_once_per_key() {
        let (counting, calls) = Counting::new(numbered(3));
        let cache = MemoCache::new(counting);

        let a = cache.query_item(&Key::from(0)).unwrap();
        let b = cache.query_item(&Key::from(0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(calls.get(), 1);

        cache.query_item(&Key::from(1)).unwrap();
        cache.query_item(&Key::from(0)).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_fill_forget_releases_inner_and_stays_queryable() {
        let (counting, calls) = Counting::new(numbered(4));
        let mut cache = MemoCache::new(counting);
        cache.fill_forget().unwrap();
        assert!(cache.is_frozen());
        assert_eq!(calls.get(), 4);

        // Key space is exactly the enumerated keys, in enumeration order.
        let keys = cache.list_keys().unwrap();
        assert_eq!(keys, (0..4).map(Key::from).collect::<Vec<_>>());

        // Every key is served from the cache without the inner dataset.
        for key in keys {
            cache.query_item(&key).unwrap();
        }
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_miss_after_fill_forget_is_stale_index() {
        let mut cache = MemoCache::new(numbered(2));
        cache.fill_forget().unwrap();

        let err = cache.query_item(&Key::from(9)).unwrap_err();
        assert!(matches!(err, FeedError::StaleIndex { .. }));
    }

    #[test]
    fn test_batches_through_memo_cache() {
        let mut cache = MemoCache::new(numbered(6));
        cache.fill_forget().unwrap();

        let batches: Vec<_> = cache
            .batches(cache.list_keys().unwrap(), 4)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 4);
        assert_eq!(batches[1].len(), 2);
    }
}
