//! The in-memory table handed to the engine by its upstream collaborator.
//!
//! A `Dataset` is an ordered sequence of named, typed columns. Column order is
//! significant and preserved through every later stage (transformation, encoding,
//! schema generation). Datasets are read-only once constructed; the engine never
//! mutates them.

use std::ops::Range;

use crate::error::TambakError;
use crate::traits::{extend_le, read_le_vec, WireScalar};
use crate::types::TambakDataType;

//==================================================================================
// 1. Typed Column Storage
//==================================================================================

/// The owned values of a single column, one variant per element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Boolean(Vec<bool>),
}

/// Runs `$body` with `$v` bound to the inner `Vec` of every numeric variant, and
/// `$bool_body` with `$b` bound to the boolean vector.
macro_rules! dispatch_values {
    ($values:expr, $v:ident => $body:expr, $b:ident => $bool_body:expr) => {
        match $values {
            ColumnValues::Int8($v) => $body,
            ColumnValues::Int16($v) => $body,
            ColumnValues::Int32($v) => $body,
            ColumnValues::Int64($v) => $body,
            ColumnValues::UInt8($v) => $body,
            ColumnValues::UInt16($v) => $body,
            ColumnValues::UInt32($v) => $body,
            ColumnValues::UInt64($v) => $body,
            ColumnValues::Float32($v) => $body,
            ColumnValues::Float64($v) => $body,
            ColumnValues::Boolean($b) => $bool_body,
        }
    };
}

impl ColumnValues {
    pub fn dtype(&self) -> TambakDataType {
        match self {
            ColumnValues::Int8(_) => TambakDataType::Int8,
            ColumnValues::Int16(_) => TambakDataType::Int16,
            ColumnValues::Int32(_) => TambakDataType::Int32,
            ColumnValues::Int64(_) => TambakDataType::Int64,
            ColumnValues::UInt8(_) => TambakDataType::UInt8,
            ColumnValues::UInt16(_) => TambakDataType::UInt16,
            ColumnValues::UInt32(_) => TambakDataType::UInt32,
            ColumnValues::UInt64(_) => TambakDataType::UInt64,
            ColumnValues::Float32(_) => TambakDataType::Float32,
            ColumnValues::Float64(_) => TambakDataType::Float64,
            ColumnValues::Boolean(_) => TambakDataType::Boolean,
        }
    }

    pub fn len(&self) -> usize {
        dispatch_values!(self, v => v.len(), b => b.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value at `row` widened to `f64`. Booleans read as `0.0`/`1.0`.
    pub fn value_f64(&self, row: usize) -> f64 {
        dispatch_values!(
            self,
            v => v[row].to_f64(),
            b => if b[row] { 1.0 } else { 0.0 }
        )
    }

    /// All values widened to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        dispatch_values!(
            self,
            v => v.iter().map(|x| x.to_f64()).collect(),
            b => b.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect()
        )
    }

    /// Appends the little-endian bytes of rows `range` to `out`.
    pub fn extend_le_range(&self, range: Range<usize>, out: &mut Vec<u8>) {
        dispatch_values!(
            self,
            v => extend_le(&v[range], out),
            b => out.extend(b[range].iter().map(|&x| x as u8))
        )
    }

    /// Appends the little-endian bytes of a single row to `out`.
    #[inline]
    pub fn write_value_le(&self, row: usize, out: &mut Vec<u8>) {
        dispatch_values!(
            self,
            v => v[row].write_le(out),
            b => out.push(b[row] as u8)
        )
    }

    /// Builds a column of `dtype` from its little-endian wire bytes.
    /// Trailing bytes that do not form a whole element are ignored; callers
    /// validate lengths against the descriptor first.
    pub fn from_le_bytes(dtype: TambakDataType, bytes: &[u8]) -> Self {
        match dtype {
            TambakDataType::Int8 => ColumnValues::Int8(read_le_vec(bytes)),
            TambakDataType::Int16 => ColumnValues::Int16(read_le_vec(bytes)),
            TambakDataType::Int32 => ColumnValues::Int32(read_le_vec(bytes)),
            TambakDataType::Int64 => ColumnValues::Int64(read_le_vec(bytes)),
            TambakDataType::UInt8 => ColumnValues::UInt8(read_le_vec(bytes)),
            TambakDataType::UInt16 => ColumnValues::UInt16(read_le_vec(bytes)),
            TambakDataType::UInt32 => ColumnValues::UInt32(read_le_vec(bytes)),
            TambakDataType::UInt64 => ColumnValues::UInt64(read_le_vec(bytes)),
            TambakDataType::Float32 => ColumnValues::Float32(read_le_vec(bytes)),
            TambakDataType::Float64 => ColumnValues::Float64(read_le_vec(bytes)),
            TambakDataType::Boolean => {
                ColumnValues::Boolean(bytes.iter().map(|&b| b != 0).collect())
            }
        }
    }
}

macro_rules! impl_from_vec {
    ($($t:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<Vec<$t>> for ColumnValues {
                fn from(values: Vec<$t>) -> Self {
                    ColumnValues::$variant(values)
                }
            }
        )+
    };
}

impl_from_vec!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    bool => Boolean,
);

//==================================================================================
// 2. Column & Dataset
//==================================================================================

/// A named column, exclusively owned by its `Dataset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: ColumnValues,
    /// `true` marks a present value. `None` means every row is present.
    validity: Option<Vec<bool>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: impl Into<ColumnValues>) -> Self {
        Self {
            name: name.into(),
            values: values.into(),
            validity: None,
        }
    }

    /// Attaches a validity vector. Its length must equal the number of values.
    pub fn with_validity(mut self, validity: Vec<bool>) -> Result<Self, TambakError> {
        if validity.len() != self.values.len() {
            return Err(TambakError::InvalidDataset(format!(
                "Column '{}' has {} values but a validity vector of length {}",
                self.name,
                self.values.len(),
                validity.len()
            )));
        }
        // An all-valid mask carries no information.
        self.validity = if validity.iter().all(|&v| v) {
            None
        } else {
            Some(validity)
        };
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    pub fn dtype(&self) -> TambakDataType {
        self.values.dtype()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn validity(&self) -> Option<&[bool]> {
        self.validity.as_deref()
    }

    pub fn null_count(&self) -> usize {
        self.validity
            .as_ref()
            .map_or(0, |mask| mask.iter().filter(|&&v| !v).count())
    }
}

/// One named table: ordered columns sharing a row count.
///
/// Equal column lengths are an upstream invariant. The dataset does not reject
/// ragged input itself; the codecs check it and fail before writing any byte.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// Creates a dataset, rejecting duplicate column names.
    pub fn new(columns: Vec<Column>) -> Result<Self, TambakError> {
        let mut dataset = Dataset::default();
        for column in columns {
            dataset = dataset.with_column(column)?;
        }
        Ok(dataset)
    }

    /// Appends a column at the end of the declared order.
    pub fn with_column(mut self, column: Column) -> Result<Self, TambakError> {
        if self.column(column.name()).is_some() {
            return Err(TambakError::InvalidDataset(format!(
                "Duplicate column name '{}'",
                column.name()
            )));
        }
        self.columns.push(column);
        Ok(self)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks a column up by name. Absence is an explicit `None`, never a default.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// The row count of the first column (0 for a dataset without columns).
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }

    /// `true` when every column has the same length.
    pub fn is_rectangular(&self) -> bool {
        let rows = self.row_count();
        self.columns.iter().all(|c| c.len() == rows)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.row_count() == 0
    }
}

/// A dataset together with the stream name it will be exported under.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedDataset {
    pub name: String,
    pub dataset: Dataset,
}

impl NamedDataset {
    pub fn new(name: impl Into<String>, dataset: Dataset) -> Self {
        Self {
            name: name.into(),
            dataset,
        }
    }
}
