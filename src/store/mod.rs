// src/store/mod.rs

//! The indexed on-disk store.
//!
//! # Example
//!
//! ```no_run
//! use batchfeed::store::{create_or_open, ReconcileOptions};
//! use batchfeed::{Dataset, Key, MapDataset, Payload};
//!
//! let source = MapDataset::new([
//!     (Key::from("a"), vec![Payload::Int(1)]),
//!     (Key::from("b"), vec![Payload::Int(2)]),
//! ]);
//!
//! // Materialize once, replay cheaply afterwards.
//! let store = create_or_open(&source, "cache.store", ReconcileOptions::default()).unwrap();
//! let batch = store.query(&store.list_keys().unwrap()).unwrap();
//! assert_eq!(batch.len(), 2);
//! ```

mod format;
mod indexed;
mod reconcile;
mod registry;

pub use format::{StoreHeader, HEADER_LEN, STORE_MAGIC, STORE_VERSION};
pub use indexed::IndexedStore;
pub use reconcile::{create_or_open, ReconcileOptions};
pub use registry::StoreHandle;
