// src/dataset/mod.rs

//! The dataset contract and batch assembly.
//!
//! # Example
//!
//! ```
//! use batchfeed::{Dataset, Key, MapDataset, Payload};
//!
//! let dataset = MapDataset::new([
//!     (Key::from(0), vec![Payload::from("Denzel"), Payload::from("Washington")]),
//!     (Key::from(1), vec![Payload::from("Tom"), Payload::from("Hanks")]),
//! ]);
//!
//! let batch = dataset.query(&[Key::from(0), Key::from(1)]).unwrap();
//! assert_eq!(batch.width(), 2);
//! assert_eq!(batch.len(), 2);
//!
//! for batch in dataset.batches(dataset.list_keys().unwrap(), 1) {
//!     assert_eq!(batch.unwrap().len(), 1);
//! }
//! ```

mod batch;
mod chunks;
mod iterator;
mod traits;

pub use batch::{Batch, Column};
pub use chunks::ChunkSplitter;
pub use iterator::{BalancedBatches, Batches};
pub use traits::{Dataset, MapDataset};
