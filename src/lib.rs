// src/lib.rs

//! batchfeed - keyed datasets for batch consumers
//!
//! This crate provides a uniform, composable abstraction for keyed,
//! randomly-addressable datasets feeding batch-oriented consumers, a family
//! of stackable wrappers (transforms, caches, augmentation, filtering), and
//! an indexed on-disk store for materializing a dataset once and replaying
//! it cheaply thereafter.

pub mod config;
pub mod error;
pub mod item;

// Re-export commonly used types for convenience
pub use config::{FeedConfig, ReconcileConfig, StoreConfig};
pub use error::{FeedError, Result};
pub use item::{items_equal, ElementType, Item, Key, NdArray, Payload};

pub mod codec;
pub use codec::{Codec, CodecParams, CompressedArray};

pub mod scope;
pub use scope::Scope;

pub mod dataset;
pub use dataset::{BalancedBatches, Batch, Batches, ChunkSplitter, Column, Dataset, MapDataset};

pub mod wrappers;
pub use wrappers::{
    AugmentedDataset, Augmenter, FilterAugmenter, FilteredDataset, LastItemCache, MemoCache,
    OrderedQueries, Transform, TransformedDataset,
};

pub mod store;
pub use store::{create_or_open, IndexedStore, ReconcileOptions};
