// src/wrappers/mod.rs

//! Stackable dataset wrappers.
//!
//! Each wrapper owns exactly one inner dataset and implements the same
//! [`Dataset`](crate::Dataset) contract, so wrappers compose in any order:
//! transform a store, memoize a transform, augment a memo, and so on.

mod augment;
mod cache;
mod order;
mod transform;

pub use augment::{AugmentedDataset, Augmenter, FilterAugmenter, FilteredDataset};
pub use cache::{LastItemCache, MemoCache};
pub use order::OrderedQueries;
pub use transform::{Transform, TransformedDataset};
