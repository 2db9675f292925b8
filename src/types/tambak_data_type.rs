//! This module defines the canonical, type-safe representation of the element types
//! that can appear in an exported stream.

use crate::error::TambakError;
use arrow::datatypes::DataType as ArrowDataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The canonical, internal representation of a column element type.
///
/// The serialized names (`"Int16"`, `"Float32"`, ...) are part of the wire contract:
/// they appear verbatim in every schema descriptor read by downstream decoders.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TambakDataType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Boolean,
}

impl TambakDataType {
    /// Converts an Arrow `DataType` into a `TambakDataType`.
    pub fn from_arrow_type(arrow_type: &ArrowDataType) -> Result<Self, TambakError> {
        match arrow_type {
            ArrowDataType::Int8 => Ok(Self::Int8),
            ArrowDataType::Int16 => Ok(Self::Int16),
            ArrowDataType::Int32 => Ok(Self::Int32),
            ArrowDataType::Int64 => Ok(Self::Int64),
            ArrowDataType::UInt8 => Ok(Self::UInt8),
            ArrowDataType::UInt16 => Ok(Self::UInt16),
            ArrowDataType::UInt32 => Ok(Self::UInt32),
            ArrowDataType::UInt64 => Ok(Self::UInt64),
            ArrowDataType::Float32 => Ok(Self::Float32),
            ArrowDataType::Float64 => Ok(Self::Float64),
            ArrowDataType::Boolean => Ok(Self::Boolean),
            dt => Err(TambakError::UnsupportedType(format!(
                "Cannot convert Arrow type {:?} to TambakDataType",
                dt
            ))),
        }
    }

    /// Converts a `TambakDataType` back into an Arrow `DataType`.
    pub fn to_arrow_type(&self) -> ArrowDataType {
        match self {
            Self::Int8 => ArrowDataType::Int8,
            Self::Int16 => ArrowDataType::Int16,
            Self::Int32 => ArrowDataType::Int32,
            Self::Int64 => ArrowDataType::Int64,
            Self::UInt8 => ArrowDataType::UInt8,
            Self::UInt16 => ArrowDataType::UInt16,
            Self::UInt32 => ArrowDataType::UInt32,
            Self::UInt64 => ArrowDataType::UInt64,
            Self::Float32 => ArrowDataType::Float32,
            Self::Float64 => ArrowDataType::Float64,
            Self::Boolean => ArrowDataType::Boolean,
        }
    }

    /// The number of bytes one element occupies on the wire.
    /// Booleans are written as a single `0`/`1` byte.
    pub fn byte_width(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 | Self::Boolean => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Returns `true` if the data type is a signed integer.
    pub fn is_signed_int(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Returns `true` if the data type is an unsigned integer.
    pub fn is_unsigned_int(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    /// Returns `true` for any integer width, signed or unsigned.
    pub fn is_integer(&self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    /// Returns `true` if the data type is a floating-point number.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// The inclusive `(min, max)` range of an integer type, widened to `i128`.
    /// Returns `None` for floats and booleans.
    pub fn integer_bounds(&self) -> Option<(i128, i128)> {
        match self {
            Self::Int8 => Some((i8::MIN as i128, i8::MAX as i128)),
            Self::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
            Self::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            Self::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            Self::UInt8 => Some((0, u8::MAX as i128)),
            Self::UInt16 => Some((0, u16::MAX as i128)),
            Self::UInt32 => Some((0, u32::MAX as i128)),
            Self::UInt64 => Some((0, u64::MAX as i128)),
            Self::Float32 | Self::Float64 | Self::Boolean => None,
        }
    }

    /// The largest `f64` that does not exceed the integer type's maximum, as used
    /// by dynamic scaling. For 64-bit types `max as f64` rounds up past the bound,
    /// so the next representable value below it is returned instead.
    pub fn max_representable(&self) -> Option<f64> {
        self.integer_bounds().map(|(_, max)| {
            let widened = max as f64;
            if widened as i128 > max {
                f64::from_bits(widened.to_bits() - 1)
            } else {
                widened
            }
        })
    }
}

/// Provides the canonical string representation for a `TambakDataType`.
impl fmt::Display for TambakDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Same spelling as the serde representation used in descriptors.
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_widths_match_wire_format() {
        assert_eq!(TambakDataType::Int8.byte_width(), 1);
        assert_eq!(TambakDataType::UInt8.byte_width(), 1);
        assert_eq!(TambakDataType::Boolean.byte_width(), 1);
        assert_eq!(TambakDataType::Int16.byte_width(), 2);
        assert_eq!(TambakDataType::UInt16.byte_width(), 2);
        assert_eq!(TambakDataType::Int32.byte_width(), 4);
        assert_eq!(TambakDataType::Float32.byte_width(), 4);
        assert_eq!(TambakDataType::UInt64.byte_width(), 8);
        assert_eq!(TambakDataType::Float64.byte_width(), 8);
    }

    #[test]
    fn test_integer_bounds() {
        assert_eq!(TambakDataType::Int16.integer_bounds(), Some((-32768, 32767)));
        assert_eq!(TambakDataType::UInt8.integer_bounds(), Some((0, 255)));
        assert_eq!(TambakDataType::Float32.integer_bounds(), None);
        assert_eq!(TambakDataType::Int16.max_representable(), Some(32767.0));
        let max64 = TambakDataType::Int64.max_representable().unwrap();
        assert!((max64 as i128) <= i64::MAX as i128);
    }

    #[test]
    fn test_serde_names_are_stable() {
        let json = serde_json::to_string(&TambakDataType::UInt32).unwrap();
        assert_eq!(json, "\"UInt32\"");
        let parsed: TambakDataType = serde_json::from_str("\"Float64\"").unwrap();
        assert_eq!(parsed, TambakDataType::Float64);
        assert_eq!(TambakDataType::Int64.to_string(), "Int64");
    }

    #[test]
    fn test_arrow_mapping_roundtrip() {
        for dtype in [
            TambakDataType::Int8,
            TambakDataType::UInt64,
            TambakDataType::Float32,
            TambakDataType::Boolean,
        ] {
            let arrow = dtype.to_arrow_type();
            assert_eq!(TambakDataType::from_arrow_type(&arrow).unwrap(), dtype);
        }
        assert!(TambakDataType::from_arrow_type(&ArrowDataType::Utf8).is_err());
    }
}
