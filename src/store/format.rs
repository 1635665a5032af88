// src/store/format.rs

//! On-disk layout of an indexed store.
//!
//! ```text
//! +--------------------+
//! | Header (24 bytes)  |  <- magic, version, index offset, index checksum
//! +--------------------+
//! | Items (bincode)    |  <- one value per key, offsets recorded in order
//! +--------------------+
//! | Index (bincode)    |  <- Vec<(Key, u64)>, creation order preserved
//! | Context (optional) |  <- flattened scope map, absent when empty
//! +--------------------+
//! ```
//!
//! The header is written first as a placeholder and rewritten in place once
//! all items are on disk, because the index offset is only known then. Every
//! header field is fixed-width little-endian, so the encoded header length
//! never varies with the offset value.

use crate::error::{FeedError, Result};

/// Magic bytes identifying an indexed store file.
pub const STORE_MAGIC: [u8; 4] = *b"BFS1";

/// Current format version.
pub const STORE_VERSION: u32 = 1;

/// Encoded header length in bytes.
pub const HEADER_LEN: usize = 24;

/// The fixed-width file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    /// Absolute byte offset of the index region.
    pub index_offset: u64,
    /// XXHash64 of the serialized index bytes.
    pub index_checksum: u64,
}

impl StoreHeader {
    /// The header written before any item, overwritten once the real index
    /// offset is known. A zero offset is never valid (it would point inside
    /// the header), so a file still carrying the placeholder is detectably
    /// incomplete.
    pub fn placeholder() -> Self {
        Self {
            index_offset: 0,
            index_checksum: 0,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&STORE_MAGIC);
        bytes[4..8].copy_from_slice(&STORE_VERSION.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.index_offset.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.index_checksum.to_le_bytes());
        bytes
    }

    /// Decodes and validates a header.
    ///
    /// # Errors
    ///
    /// Returns an error on wrong magic bytes or an unsupported version.
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        if bytes[0..4] != STORE_MAGIC {
            return Err(FeedError::serialization(
                "not an indexed store file (bad magic bytes)",
            ));
        }
        let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        if version != STORE_VERSION {
            return Err(FeedError::serialization(format!(
                "unsupported store version: expected {STORE_VERSION}, got {version}"
            )));
        }
        Ok(Self {
            index_offset: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            index_checksum: u64::from_le_bytes(bytes[16..24].try_into().unwrap()),
        })
    }
}

/// XXHash64 of a byte slice, seed 0.
pub fn checksum(data: &[u8]) -> u64 {
    use std::hash::Hasher;
    let mut hasher = twox_hash::XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}
