// src/codec.rs

//! Transparent per-item compression for numeric arrays.
//!
//! A [`CompressedArray`] holds a plain [`NdArray`] in memory and compresses
//! it at serialization time into `(params, dtype, shape, bytes)`, so each
//! stored item is self-describing: the parameters chosen at write time are
//! read back from the payload itself. Deserialization decompresses into a
//! freshly allocated array.

use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::item::{ElementType, NdArray};

/// Compression algorithm for array payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    None,
    Lz4,
    Zstd,
}

impl Codec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Lz4 => "lz4",
            Codec::Zstd => "zstd",
        }
    }

    /// Parses a codec name as it appears in configuration files.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Codec::None),
            "lz4" => Some(Codec::Lz4),
            "zstd" => Some(Codec::Zstd),
            _ => None,
        }
    }
}

/// The compressor/level/shuffle triple applied to one array.
///
/// `level` is only meaningful for zstd. `shuffle` applies a byte shuffle by
/// element width before compression, which groups the high and low bytes of
/// neighboring elements and usually improves the ratio on numeric data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecParams {
    pub codec: Codec,
    pub level: i32,
    pub shuffle: bool,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            codec: Codec::Lz4,
            level: 1,
            shuffle: true,
        }
    }
}

/// Byte shuffle: transposes an element-major buffer into byte-plane order.
///
/// For elements of `width` bytes, plane `j` of the output holds byte `j` of
/// every element in sequence. `data.len()` must be a multiple of `width`.
fn shuffle_bytes(data: &[u8], width: usize) -> Vec<u8> {
    if width <= 1 {
        return data.to_vec();
    }
    let count = data.len() / width;
    let mut out = vec![0u8; data.len()];
    for i in 0..count {
        for j in 0..width {
            out[j * count + i] = data[i * width + j];
        }
    }
    out
}

/// Inverse of [`shuffle_bytes`].
fn unshuffle_bytes(data: &[u8], width: usize) -> Vec<u8> {
    if width <= 1 {
        return data.to_vec();
    }
    let count = data.len() / width;
    let mut out = vec![0u8; data.len()];
    for i in 0..count {
        for j in 0..width {
            out[i * width + j] = data[j * count + i];
        }
    }
    out
}

fn compress(data: &[u8], params: &CodecParams) -> std::io::Result<Vec<u8>> {
    match params.codec {
        Codec::None => Ok(data.to_vec()),
        Codec::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        Codec::Zstd => zstd::encode_all(data, params.level),
    }
}

fn decompress(data: &[u8], params: &CodecParams) -> std::io::Result<Vec<u8>> {
    match params.codec {
        Codec::None => Ok(data.to_vec()),
        Codec::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        Codec::Zstd => zstd::decode_all(data),
    }
}

/// A numeric array that crosses the serialization boundary compressed.
///
/// In memory the array is always held decompressed. Equality compares the
/// decompressed contents; the parameters are a storage detail.
#[derive(Debug, Clone)]
pub struct CompressedArray {
    params: CodecParams,
    array: NdArray,
}

impl CompressedArray {
    /// Wraps an array with the default parameters.
    pub fn new(array: NdArray) -> Self {
        Self {
            params: CodecParams::default(),
            array,
        }
    }

    pub fn with_params(array: NdArray, params: CodecParams) -> Self {
        Self { params, array }
    }

    pub fn params(&self) -> CodecParams {
        self.params
    }

    pub fn array(&self) -> &NdArray {
        &self.array
    }

    pub fn into_array(self) -> NdArray {
        self.array
    }
}

impl PartialEq for CompressedArray {
    fn eq(&self, other: &Self) -> bool {
        self.array == other.array
    }
}

/// On-disk representation: parameters plus the compressed bytes.
#[derive(Serialize, Deserialize)]
struct CompressedWire {
    params: CodecParams,
    dtype: ElementType,
    shape: Vec<usize>,
    bytes: Vec<u8>,
}

impl Serialize for CompressedArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let width = self.array.dtype().size_bytes();
        let raw = if self.params.shuffle {
            shuffle_bytes(self.array.bytes(), width)
        } else {
            self.array.bytes().to_vec()
        };
        let bytes = compress(&raw, &self.params)
            .map_err(|e| S::Error::custom(format!("array compression failed: {e}")))?;
        CompressedWire {
            params: self.params,
            dtype: self.array.dtype(),
            shape: self.array.shape().to_vec(),
            bytes,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CompressedArray {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let wire = CompressedWire::deserialize(deserializer)?;
        let raw = decompress(&wire.bytes, &wire.params)
            .map_err(|e| D::Error::custom(format!("array decompression failed: {e}")))?;
        let data = if wire.params.shuffle {
            unshuffle_bytes(&raw, wire.dtype.size_bytes())
        } else {
            raw
        };
        let array = NdArray::from_bytes(wire.dtype, wire.shape, data)
            .ok_or_else(|| D::Error::custom("decompressed length does not match array shape"))?;
        Ok(Self {
            params: wire.params,
            array,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_array() -> NdArray {
        let values: Vec<f32> = (0..256).map(|i| (i % 16) as f32).collect();
        NdArray::from_f32(vec![16, 16], &values).unwrap()
    }

    #[test]
    fn test_shuffle_roundtrip() {
        let data: Vec<u8> = (0..64).collect();
        for width in [1, 2, 4, 8] {
            let shuffled = shuffle_bytes(&data, width);
            assert_eq!(unshuffle_bytes(&shuffled, width), data);
        }
    }

    #[test]
    fn test_shuffle_groups_byte_planes() {
        // Two 4-byte elements: planes hold first bytes, then second bytes, ...
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let shuffled = shuffle_bytes(&data, 4);
        assert_eq!(shuffled, [1, 5, 2, 6, 3, 7, 4, 8]);
    }

    #[test]
    fn test_serde_roundtrip_all_codecs() {
        for codec in [Codec::None, Codec::Lz4, Codec::Zstd] {
            for shuffle in [false, true] {
                let params = CodecParams {
                    codec,
                    level: 3,
                    shuffle,
                };
                let original = CompressedArray::with_params(sample_array(), params);
                let encoded = bincode::serialize(&original).unwrap();
                let decoded: CompressedArray = bincode::deserialize(&encoded).unwrap();
                assert_eq!(decoded, original);
                assert_eq!(decoded.params(), params);
            }
        }
    }

    #[test]
    fn test_compression_shrinks_repetitive_data() {
        let params = CodecParams {
            codec: Codec::Zstd,
            level: 3,
            shuffle: true,
        };
        let original = CompressedArray::with_params(sample_array(), params);
        let encoded = bincode::serialize(&original).unwrap();
        assert!(encoded.len() < sample_array().bytes().len());
    }

    #[test]
    fn test_equality_ignores_params() {
        let a = CompressedArray::with_params(
            sample_array(),
            CodecParams {
                codec: Codec::Zstd,
                level: 9,
                shuffle: false,
            },
        );
        let b = CompressedArray::new(sample_array());
        assert_eq!(a, b);
    }

    #[test]
    fn test_codec_parse() {
        assert_eq!(Codec::parse("lz4"), Some(Codec::Lz4));
        assert_eq!(Codec::parse("zstd"), Some(Codec::Zstd));
        assert_eq!(Codec::parse("none"), Some(Codec::None));
        assert_eq!(Codec::parse("blosclz"), None);
    }
}
