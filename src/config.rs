// src/config.rs

//! Configuration for store creation and reconciliation.
//!
//! Parsed from TOML with serde defaults, then optionally overridden from
//! `BATCHFEED_*` environment variables and validated.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::codec::{Codec, CodecParams};
use crate::error::{FeedError, Result};

/// Top-level library configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub store: StoreConfig,
    pub reconcile: ReconcileConfig,
}

// Store creation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    // Compression algorithm for array payloads: "none", "lz4", or "zstd".
    pub compression: String,
    // Compression level (zstd only).
    pub compression_level: i32,
    // Whether to byte-shuffle array payloads before compression.
    pub shuffle: bool,
    // Buffer size in bytes for file I/O.
    pub buffer_size: usize,
}

// Reconciliation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    // Number of leading keys re-verified against the source dataset after
    // opening a materialized store. 0 disables the check.
    pub check_first_n: usize,
    // Whether to delete and re-create an existing store.
    pub overwrite: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compression: "lz4".to_string(),
            compression_level: 1,
            shuffle: true,
            buffer_size: 64 * 1024, // 64 KB
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            check_first_n: 1,
            overwrite: false,
        }
    }
}

impl StoreConfig {
    /// The codec parameter triple derived from this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the compression name is unknown.
    pub fn codec_params(&self) -> Result<CodecParams> {
        let codec = Codec::parse(&self.compression).ok_or_else(|| {
            FeedError::config(format!(
                "unknown compression algorithm: {}",
                self.compression
            ))
        })?;
        Ok(CodecParams {
            codec,
            level: self.compression_level,
            shuffle: self.shuffle,
        })
    }
}

impl FromStr for FeedConfig {
    type Err = FeedError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| FeedError::config_with_source("failed to parse TOML config", e))
    }
}

impl FeedConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| FeedError::storage_with_source(path, "failed to read config file", e))?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Variables are prefixed with `BATCHFEED_`:
    // - `BATCHFEED_STORE_COMPRESSION` overrides `store.compression`
    // - `BATCHFEED_STORE_COMPRESSION_LEVEL` overrides `store.compression_level`
    // - `BATCHFEED_STORE_SHUFFLE` overrides `store.shuffle`
    // - `BATCHFEED_STORE_BUFFER_SIZE` overrides `store.buffer_size`
    // - `BATCHFEED_RECONCILE_CHECK_FIRST_N` overrides `reconcile.check_first_n`
    // - `BATCHFEED_RECONCILE_OVERWRITE` overrides `reconcile.overwrite`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("BATCHFEED_STORE_COMPRESSION") {
            self.store.compression = val;
        }
        if let Ok(val) = std::env::var("BATCHFEED_STORE_COMPRESSION_LEVEL") {
            if let Ok(v) = val.parse() {
                self.store.compression_level = v;
            }
        }
        if let Ok(val) = std::env::var("BATCHFEED_STORE_SHUFFLE") {
            if let Ok(v) = val.parse() {
                self.store.shuffle = v;
            }
        }
        if let Ok(val) = std::env::var("BATCHFEED_STORE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.store.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("BATCHFEED_RECONCILE_CHECK_FIRST_N") {
            if let Ok(v) = val.parse() {
                self.reconcile.check_first_n = v;
            }
        }
        if let Ok(val) = std::env::var("BATCHFEED_RECONCILE_OVERWRITE") {
            if let Ok(v) = val.parse() {
                self.reconcile.overwrite = v;
            }
        }
        self
    }

    // Validate all configuration values.
    pub fn validate(&self) -> Result<()> {
        if Codec::parse(&self.store.compression).is_none() {
            return Err(FeedError::config(format!(
                "store.compression must be one of: none, lz4, zstd (got {:?})",
                self.store.compression
            )));
        }
        if self.store.buffer_size == 0 {
            return Err(FeedError::config("store.buffer_size must be greater than 0"));
        }
        Ok(())
    }
}
