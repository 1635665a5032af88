// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

use crate::item::Key;

#[derive(Error, Debug)]
pub enum FeedError {

    #[error("key {key} not found")]
    KeyNotFound {
        key: Key,
    },

    #[error("cannot assemble a batch from an empty key list")]
    EmptyBatch,

    #[error("batch size {batch_size} is not evenly divisible across {groups} key groups")]
    EvenSplitRequired {
        batch_size: usize,
        groups: usize,
    },

    #[error("filter predicate returned a non-boolean value for key {key}")]
    InvalidPredicate {
        key: Key,
    },

    #[error("cache miss for key {key} after the inner dataset was released")]
    StaleIndex {
        key: Key,
    },

    #[error("store creation at '{path}' was interrupted: {message}")]
    PartialWrite {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("serialization error: {message}")]
    Serialization {
        message: String,
    },

    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("dataset error: {message}")]
    Dataset {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, FeedError>;

// Convenience constructors
impl FeedError {

    pub fn key_not_found(key: impl Into<Key>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    pub fn stale_index(key: impl Into<Key>) -> Self {
        Self::StaleIndex { key: key.into() }
    }

    pub fn invalid_predicate(key: impl Into<Key>) -> Self {
        Self::InvalidPredicate { key: key.into() }
    }

    pub fn partial_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PartialWrite {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn partial_write_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::PartialWrite {
            path: path.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn dataset(message: impl Into<String>) -> Self {
        Self::Dataset {
            message: message.into(),
        }
    }
}
