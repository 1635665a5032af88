// src/dataset/batch.rs

//! Columnar batch assembly.
//!
//! A batch holds one column per item tuple position. Columns of numeric
//! payloads are stacked into a single array with the batch size as leading
//! axis; the element type is inferred from the payloads at assembly time
//! (integer scalars promote to float when mixed with floats). Payloads that
//! do not stack are kept row-wise.

use crate::item::{NdArray, Payload};

/// One column of a batch: either a stacked numeric array or the raw row
/// payloads for positions that do not stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Array(NdArray),
    Rows(Vec<Payload>),
}

impl Column {
    /// Number of rows in this column.
    pub fn len(&self) -> usize {
        match self {
            Column::Array(a) => a.shape().first().copied().unwrap_or(0),
            Column::Rows(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Column::Array(a) => Some(a),
            Column::Rows(_) => None,
        }
    }

    pub fn as_rows(&self) -> Option<&[Payload]> {
        match self {
            Column::Rows(rows) => Some(rows),
            Column::Array(_) => None,
        }
    }

    /// Stacks one tuple position's payloads into a column.
    pub fn from_payloads(payloads: Vec<Payload>) -> Column {
        if payloads.is_empty() {
            return Column::Rows(payloads);
        }
        if let Some(stacked) = stack_arrays(&payloads) {
            return Column::Array(stacked);
        }
        if let Some(stacked) = stack_scalars(&payloads) {
            return Column::Array(stacked);
        }
        Column::Rows(payloads)
    }

    /// Reorders rows: row `i` of the result is row `order[i]` of `self`.
    pub fn gather(&self, order: &[usize]) -> Option<Column> {
        match self {
            Column::Array(a) => a.gather_rows(order).map(Column::Array),
            Column::Rows(rows) => order
                .iter()
                .map(|&i| rows.get(i).cloned())
                .collect::<Option<Vec<_>>>()
                .map(Column::Rows),
        }
    }
}

/// Stacks the column when every payload is an array (compressed or plain)
/// of identical dtype and shape.
fn stack_arrays(payloads: &[Payload]) -> Option<NdArray> {
    let arrays: Vec<&NdArray> = payloads
        .iter()
        .map(|p| match p {
            Payload::Array(a) => Some(a),
            Payload::Compressed(c) => Some(c.array()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    NdArray::stack(&arrays)
}

/// Stacks the column when every payload is a numeric scalar. All-integer
/// columns become `i64` arrays; mixed integer/float columns promote to
/// `f64`.
fn stack_scalars(payloads: &[Payload]) -> Option<NdArray> {
    let all_int = payloads.iter().all(|p| matches!(p, Payload::Int(_)));
    if all_int {
        let values: Vec<i64> = payloads
            .iter()
            .map(|p| match p {
                Payload::Int(v) => *v,
                _ => unreachable!(),
            })
            .collect();
        return NdArray::from_i64(vec![values.len()], &values);
    }
    let values: Vec<f64> = payloads
        .iter()
        .map(|p| match p {
            Payload::Int(v) => Some(*v as f64),
            Payload::Float(v) => Some(*v),
            _ => None,
        })
        .collect::<Option<_>>()?;
    NdArray::from_f64(vec![values.len()], &values)
}

/// The columnar form of several items: one column per tuple position, every
/// column of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    columns: Vec<Column>,
}

impl Batch {
    /// Assembles a batch from row-major payload columns.
    pub fn from_columns(columns: Vec<Vec<Payload>>) -> Batch {
        Batch {
            columns: columns.into_iter().map(Column::from_payloads).collect(),
        }
    }

    /// Item arity (number of columns).
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows (keys) in the batch.
    pub fn len(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, position: usize) -> Option<&Column> {
        self.columns.get(position)
    }

    /// Reorders every column's rows by `order`.
    pub fn gather(&self, order: &[usize]) -> Option<Batch> {
        let columns = self
            .columns
            .iter()
            .map(|c| c.gather(order))
            .collect::<Option<Vec<_>>>()?;
        Some(Batch { columns })
    }
}
