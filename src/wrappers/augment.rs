// src/wrappers/augment.rs

//! One-to-many augmentation and predicate filtering.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dataset::Dataset;
use crate::error::{FeedError, Result};
use crate::item::{Item, Key, Payload};
use crate::scope::Scope;

/// Derives several `(key, item)` pairs from one root item.
///
/// Derived keys must be globally unique across roots; the behavior is
/// undefined if two roots produce the same derived key.
pub trait Augmenter {
    fn augment(&self, root_key: &Key, root_item: &Item) -> Result<Vec<(Key, Item)>>;

    /// Maps a derived key back to the root key that produced it. The default
    /// takes the first element of a composite key and leaves other keys
    /// unchanged.
    fn root_key(&self, derived: &Key) -> Key {
        match derived {
            Key::Composite(parts) if !parts.is_empty() => parts[0].clone(),
            _ => derived.clone(),
        }
    }
}

/// Expands each root key of the inner dataset into the keys its augmenter
/// derives from it.
///
/// Only the most recently touched root's derivation is cached, so querying
/// derived keys grouped by root computes each augmentation once. Interleaving
/// roots recomputes on every switch; sort derived keys by root first (see
/// [`OrderedQueries`](crate::wrappers::OrderedQueries)) to keep locality.
pub struct AugmentedDataset<D, A> {
    inner: D,
    augmenter: A,
    cache: RefCell<Option<(Key, Rc<Vec<(Key, Item)>>)>>,
}

impl<D: Dataset, A: Augmenter> AugmentedDataset<D, A> {
    pub fn new(inner: D, augmenter: A) -> Self {
        Self {
            inner,
            augmenter,
            cache: RefCell::new(None),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Computes or reuses the derivation for one root key.
    fn derived_for(&self, root: &Key) -> Result<Rc<Vec<(Key, Item)>>> {
        if let Some((cached_root, derived)) = self.cache.borrow().as_ref() {
            if cached_root == root {
                return Ok(derived.clone());
            }
        }
        let root_item = self.inner.query_item(root)?;
        let derived = Rc::new(self.augmenter.augment(root, &root_item)?);
        *self.cache.borrow_mut() = Some((root.clone(), derived.clone()));
        Ok(derived)
    }
}

impl<D: Dataset, A: Augmenter> Dataset for AugmentedDataset<D, A> {
    fn list_keys(&self) -> Result<Vec<Key>> {
        let mut keys = Vec::new();
        for root in self.inner.list_keys()? {
            let derived = self.derived_for(&root)?;
            keys.extend(derived.iter().map(|(key, _)| key.clone()));
        }
        Ok(keys)
    }

    fn query_item(&self, key: &Key) -> Result<Item> {
        let root = self.augmenter.root_key(key);
        let derived = self.derived_for(&root)?;
        derived
            .iter()
            .find(|(derived_key, _)| derived_key == key)
            .map(|(_, item)| item.clone())
            .ok_or_else(|| FeedError::key_not_found(key.clone()))
    }

    fn scope(&self) -> Scope {
        self.inner.scope()
    }
}

/// An augmenter that keeps or drops each pair according to a predicate.
pub struct FilterAugmenter<P> {
    predicate: P,
    keep_positive: bool,
}

impl<P: Fn(&Key, &Item) -> Payload> Augmenter for FilterAugmenter<P> {
    fn augment(&self, root_key: &Key, root_item: &Item) -> Result<Vec<(Key, Item)>> {
        match (self.predicate)(root_key, root_item) {
            Payload::Bool(truth) if truth == self.keep_positive => {
                Ok(vec![(root_key.clone(), root_item.clone())])
            }
            Payload::Bool(_) => Ok(Vec::new()),
            _ => Err(FeedError::invalid_predicate(root_key.clone())),
        }
    }

    // Filtering never rewrites keys.
    fn root_key(&self, derived: &Key) -> Key {
        derived.clone()
    }
}

/// Filters the inner key space by a predicate over `(key, item)`.
///
/// The predicate must evaluate to a boolean payload; anything else is an
/// `InvalidPredicate` fault. Pairs are kept when the boolean equals
/// `keep_positive`.
pub type FilteredDataset<D, P> = AugmentedDataset<D, FilterAugmenter<P>>;

impl<D: Dataset, P: Fn(&Key, &Item) -> Payload> FilteredDataset<D, P> {
    pub fn filtered(inner: D, predicate: P, keep_positive: bool) -> Self {
        AugmentedDataset::new(
            inner,
            FilterAugmenter {
                predicate,
                keep_positive,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MapDataset;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counting {
        inner: MapDataset,
        calls: Rc<Cell<usize>>,
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

    fn pairs() -> MapDataset {
        MapDataset::new([
            (
                Key::from(0),
                vec![Payload::from("Denzel"), Payload::from("Washington")],
            ),
            (
                Key::from(1),
                vec![Payload::from("Tom"), Payload::from("Hanks")],
            ),
        ])
    }

    /// Yields the item and its reversal under derived keys `(root, 0)` and
    /// `(root, 1)`.
    struct Permuting;

    impl Augmenter for Permuting {
        fn augment(&self, root_key: &Key, root_item: &Item) -> Result<Vec<(Key, Item)>> {
            let mut reversed = root_item.clone();
            reversed.reverse();
            Ok(vec![
                (Key::derived(root_key.clone(), 0), root_item.clone()),
                (Key::derived(root_key.clone(), 1), reversed),
            ])
        }
    }

    #[test]
    fn test_list_keys_expands_each_root() {
        let dataset = AugmentedDataset::new(pairs(), Permuting);
        let keys = dataset.list_keys().unwrap();
        assert_eq!(
            keys,
            vec![
                Key::derived(Key::from(0), 0),
                Key::derived(Key::from(0), 1),
                Key::derived(Key::from(1), 0),
                Key::derived(Key::from(1), 1),
            ]
        );
    }

    #[test]
    fn test_query_item_resolves_derived_keys() {
        let dataset = AugmentedDataset::new(pairs(), Permuting);
        let plain = dataset
            .query_item(&Key::derived(Key::from(0), 0))
            .unwrap();
        let reversed = dataset
            .query_item(&Key::derived(Key::from(0), 1))
            .unwrap();
        assert_eq!(plain[0], Payload::from("Denzel"));
        assert_eq!(reversed[0], Payload::from("Washington"));
    }

    #[test]
    fn test_single_augmentation_per_root() {
        let calls = Rc::new(Cell::new(0));
        let counting = Counting {
            inner: pairs(),
            calls: calls.clone(),
        };
        let dataset = AugmentedDataset::new(counting, Permuting);

        dataset
            .query_item(&Key::derived(Key::from(0), 0))
            .unwrap();
        dataset
            .query_item(&Key::derived(Key::from(0), 1))
            .unwrap();
        assert_eq!(calls.get(), 1);

        // Switching roots recomputes; coming back recomputes again.
        dataset
            .query_item(&Key::derived(Key::from(1), 0))
            .unwrap();
        dataset
            .query_item(&Key::derived(Key::from(0), 0))
            .unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_unknown_derived_key() {
        let dataset = AugmentedDataset::new(pairs(), Permuting);
        let err = dataset
            .query_item(&Key::derived(Key::from(0), 7))
            .unwrap_err();
        assert!(matches!(err, FeedError::KeyNotFound { .. }));
    }

    fn evens() -> MapDataset {
        MapDataset::new((0..6).map(|i| (Key::from(i), vec![Payload::Int(i)])))
    }

    #[test]
    fn test_filtered_list_keys() {
        let dataset = FilteredDataset::filtered(
            evens(),
            |_, item| match item[0] {
                Payload::Int(v) => Payload::Bool(v % 2 == 0),
                _ => Payload::Bool(false),
            },
            true,
        );
        assert_eq!(
            dataset.list_keys().unwrap(),
            vec![Key::from(0), Key::from(2), Key::from(4)]
        );
    }

    #[test]
    fn test_filtered_negative_polarity() {
        let dataset = FilteredDataset::filtered(
            evens(),
            |_, item| match item[0] {
                Payload::Int(v) => Payload::Bool(v % 2 == 0),
                _ => Payload::Bool(false),
            },
            false,
        );
        assert_eq!(
            dataset.list_keys().unwrap(),
            vec![Key::from(1), Key::from(3), Key::from(5)]
        );
        // Kept keys resolve to their unchanged items.
        assert_eq!(
            dataset.query_item(&Key::from(3)).unwrap(),
            vec![Payload::Int(3)]
        );
    }

    #[test]
    fn test_non_boolean_predicate_is_rejected() {
        let dataset = FilteredDataset::filtered(evens(), |_, _| Payload::from("yes"), true);
        let err = dataset.list_keys().unwrap_err();
        assert!(matches!(err, FeedError::InvalidPredicate { .. }));
    }
}
