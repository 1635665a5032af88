// src/item.rs

//! Core data model: keys, payload values, items, and numeric arrays.
//!
//! A dataset maps opaque [`Key`]s to [`Item`]s. An item is a fixed-arity
//! tuple of [`Payload`] values; the arity must be uniform across all keys of
//! one dataset. Numeric payloads are carried as [`NdArray`], a dtype-tagged
//! contiguous buffer, so that items of any element type can cross the
//! serialization boundary without a generic parameter.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::CompressedArray;

/// An opaque dataset key.
///
/// Keys are chosen by the producer; uniqueness within one dataset's key
/// space is the producer's responsibility. `Composite` keys are used by
/// augmenting wrappers to derive several keys from one root key. `Offset`
/// keys are raw byte offsets exposed by offset-keyed stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Int(i64),
    Str(String),
    Composite(Vec<Key>),
    Offset(u64),
}

impl Key {
    /// Builds a composite key from parts.
    pub fn composite(parts: impl IntoIterator<Item = Key>) -> Self {
        Key::Composite(parts.into_iter().collect())
    }

    /// Pairs a root key with a small discriminant, the common shape of a
    /// derived key.
    pub fn derived(root: Key, index: i64) -> Self {
        Key::Composite(vec![root, Key::Int(index)])
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Str(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Str(v)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Str(v) => write!(f, "{v:?}"),
            Key::Composite(parts) => {
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
            Key::Offset(v) => write!(f, "@{v}"),
        }
    }
}

/// Element type of an [`NdArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    U8,
    I32,
    I64,
    F32,
    F64,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::I32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::F64 => 8,
        }
    }
}

/// A dense numeric array: element type, shape, and contiguous
/// little-endian bytes.
///
/// Equality is element-wise on decoded values, so float comparisons follow
/// IEEE semantics (`NaN != NaN`), matching what batch consumers expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NdArray {
    dtype: ElementType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl NdArray {
    /// Builds an array from raw little-endian bytes.
    ///
    /// Returns `None` if `data` does not hold exactly
    /// `shape.product() * dtype.size_bytes()` bytes.
    pub fn from_bytes(dtype: ElementType, shape: Vec<usize>, data: Vec<u8>) -> Option<Self> {
        let count: usize = shape.iter().product();
        if data.len() != count * dtype.size_bytes() {
            return None;
        }
        Some(Self { dtype, shape, data })
    }

    pub fn from_u8(shape: Vec<usize>, values: &[u8]) -> Option<Self> {
        Self::from_bytes(ElementType::U8, shape, values.to_vec())
    }

    pub fn from_i32(shape: Vec<usize>, values: &[i32]) -> Option<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_bytes(ElementType::I32, shape, data)
    }

    pub fn from_i64(shape: Vec<usize>, values: &[i64]) -> Option<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_bytes(ElementType::I64, shape, data)
    }

    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> Option<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_bytes(ElementType::F32, shape, data)
    }

    pub fn from_f64(shape: Vec<usize>, values: &[f64]) -> Option<Self> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_bytes(ElementType::F64, shape, data)
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Contiguous little-endian view of the element bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Total number of elements.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Decodes the elements as `f32`. Returns `None` for other dtypes.
    pub fn as_f32(&self) -> Option<Vec<f32>> {
        match self.dtype {
            ElementType::F32 => Some(
                self.data
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Decodes the elements as `f64`. Returns `None` for other dtypes.
    pub fn as_f64(&self) -> Option<Vec<f64>> {
        match self.dtype {
            ElementType::F64 => Some(
                self.data
                    .chunks_exact(8)
                    .map(|b| {
                        f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Decodes the elements as `i64`. Returns `None` for other dtypes.
    pub fn as_i64(&self) -> Option<Vec<i64>> {
        match self.dtype {
            ElementType::I64 => Some(
                self.data
                    .chunks_exact(8)
                    .map(|b| {
                        i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Stacks same-shaped, same-dtype arrays along a new leading axis.
    ///
    /// Returns `None` when the slice is empty or the arrays disagree on
    /// dtype or shape.
    pub fn stack(arrays: &[&NdArray]) -> Option<NdArray> {
        let first = *arrays.first()?;
        if arrays
            .iter()
            .any(|a| a.dtype != first.dtype || a.shape != first.shape)
        {
            return None;
        }
        let mut shape = Vec::with_capacity(first.shape.len() + 1);
        shape.push(arrays.len());
        shape.extend_from_slice(&first.shape);
        let mut data = Vec::with_capacity(first.data.len() * arrays.len());
        for array in arrays {
            data.extend_from_slice(&array.data);
        }
        Some(NdArray {
            dtype: first.dtype,
            shape,
            data,
        })
    }

    /// Reorders rows along the leading axis: row `i` of the result is row
    /// `order[i]` of `self`. `order` must be a permutation of the leading
    /// axis; out-of-range entries return `None`.
    pub fn gather_rows(&self, order: &[usize]) -> Option<NdArray> {
        let rows = *self.shape.first()?;
        let row_bytes = if rows == 0 { 0 } else { self.data.len() / rows };
        let mut data = Vec::with_capacity(row_bytes * order.len());
        for &i in order {
            if i >= rows {
                return None;
            }
            data.extend_from_slice(&self.data[i * row_bytes..(i + 1) * row_bytes]);
        }
        let mut shape = self.shape.clone();
        shape[0] = order.len();
        Some(NdArray {
            dtype: self.dtype,
            shape,
            data,
        })
    }
}

impl PartialEq for NdArray {
    fn eq(&self, other: &Self) -> bool {
        if self.dtype != other.dtype || self.shape != other.shape {
            return false;
        }
        match self.dtype {
            // Integer bytes are canonical, so byte equality is value equality.
            ElementType::U8 | ElementType::I32 | ElementType::I64 => self.data == other.data,
            ElementType::F32 => {
                let (a, b) = (self.as_f32().unwrap(), other.as_f32().unwrap());
                a.iter().zip(&b).all(|(x, y)| x == y)
            }
            ElementType::F64 => {
                let (a, b) = (self.as_f64().unwrap(), other.as_f64().unwrap());
                a.iter().zip(&b).all(|(x, y)| x == y)
            }
        }
    }
}

/// One payload value of an item.
///
/// Equality is deep: lists and maps recurse, arrays compare element-wise,
/// and compressed arrays compare their decompressed contents. Values of
/// different variants never compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Payload>),
    Map(BTreeMap<String, Payload>),
    Array(NdArray),
    Compressed(CompressedArray),
}

impl From<bool> for Payload {
    fn from(v: bool) -> Self {
        Payload::Bool(v)
    }
}

impl From<i64> for Payload {
    fn from(v: i64) -> Self {
        Payload::Int(v)
    }
}

impl From<f64> for Payload {
    fn from(v: f64) -> Self {
        Payload::Float(v)
    }
}

impl From<&str> for Payload {
    fn from(v: &str) -> Self {
        Payload::Str(v.to_string())
    }
}

impl From<String> for Payload {
    fn from(v: String) -> Self {
        Payload::Str(v)
    }
}

impl From<NdArray> for Payload {
    fn from(v: NdArray) -> Self {
        Payload::Array(v)
    }
}

/// A fixed-arity tuple of payload values produced for one key.
pub type Item = Vec<Payload>;

/// Deep structural equality between two items.
///
/// Used by reconciliation to compare a freshly computed item against its
/// stored counterpart.
pub fn items_equal(a: &Item, b: &Item) -> bool {
    a == b
}
