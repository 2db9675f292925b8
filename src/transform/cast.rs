//! This module contains the pure, stateless kernel for the `cast` rule.
//!
//! Conversion rules:
//! - integer → integer is exact and range-checked;
//! - float → integer truncates toward zero, is range-checked, and rejects NaN/inf;
//! - anything → float is a plain numeric conversion;
//! - boolean → number is `0`/`1`, number → boolean is `value != 0`.
//!
//! Range violations follow the configured `OverflowPolicy`, exactly like quantization.

use crate::config::OverflowPolicy;
use crate::dataset::ColumnValues;
use crate::error::TambakError;
use crate::types::TambakDataType;

/// The output of casting one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Casted {
    pub values: ColumnValues,
    /// Number of values saturated under `OverflowPolicy::Clamp`.
    pub clamped: usize,
}

/// Casts `values` to `target`. Null rows are written as zero and never checked.
pub fn cast_values(
    stream: &str,
    column: &str,
    values: &ColumnValues,
    validity: Option<&[bool]>,
    target: TambakDataType,
    policy: OverflowPolicy,
) -> Result<Casted, TambakError> {
    if values.dtype() == target {
        return Ok(Casted {
            values: values.clone(),
            clamped: 0,
        });
    }

    match target {
        TambakDataType::Float32 => Ok(Casted {
            values: ColumnValues::Float32(values.to_f64_vec().into_iter().map(|v| v as f32).collect()),
            clamped: 0,
        }),
        TambakDataType::Float64 => Ok(Casted {
            values: ColumnValues::Float64(values.to_f64_vec()),
            clamped: 0,
        }),
        TambakDataType::Boolean => Ok(Casted {
            values: ColumnValues::Boolean(values.to_f64_vec().into_iter().map(|v| v != 0.0).collect()),
            clamped: 0,
        }),
        _ => cast_to_integer(stream, column, values, validity, target, policy),
    }
}

fn cast_to_integer(
    stream: &str,
    column: &str,
    values: &ColumnValues,
    validity: Option<&[bool]>,
    target: TambakDataType,
    policy: OverflowPolicy,
) -> Result<Casted, TambakError> {
    let (min, max) = target.integer_bounds().ok_or_else(|| {
        TambakError::InternalError(format!("cast_to_integer called with {}", target))
    })?;

    let mut clamped = 0usize;
    let mut widened = Vec::with_capacity(values.len());
    for row in 0..values.len() {
        if !validity.map_or(true, |mask| mask[row]) {
            widened.push(0i128);
            continue;
        }
        let value = match exact_integer(values, row) {
            Some(v) => v,
            None => {
                let f = values.value_f64(row);
                if !f.is_finite() {
                    return Err(TambakError::codec(
                        stream,
                        format!(
                            "column '{}': non-finite value {} at row {} cannot be cast to {}",
                            column, f, row, target
                        ),
                    ));
                }
                f.trunc() as i128
            }
        };

        if value < min || value > max {
            match policy {
                OverflowPolicy::Error => {
                    return Err(TambakError::codec(
                        stream,
                        format!(
                            "column '{}': value {} at row {} is outside the {} range [{}, {}]",
                            column, value, row, target, min, max
                        ),
                    ));
                }
                OverflowPolicy::Clamp => {
                    clamped += 1;
                    widened.push(value.clamp(min, max));
                }
            }
        } else {
            widened.push(value);
        }
    }

    Ok(Casted {
        values: narrow_integers(target, widened)?,
        clamped,
    })
}

/// The exact integer value at `row` for integer and boolean columns; `None` for floats.
fn exact_integer(values: &ColumnValues, row: usize) -> Option<i128> {
    match values {
        ColumnValues::Int8(v) => Some(v[row] as i128),
        ColumnValues::Int16(v) => Some(v[row] as i128),
        ColumnValues::Int32(v) => Some(v[row] as i128),
        ColumnValues::Int64(v) => Some(v[row] as i128),
        ColumnValues::UInt8(v) => Some(v[row] as i128),
        ColumnValues::UInt16(v) => Some(v[row] as i128),
        ColumnValues::UInt32(v) => Some(v[row] as i128),
        ColumnValues::UInt64(v) => Some(v[row] as i128),
        ColumnValues::Boolean(v) => Some(v[row] as i128),
        ColumnValues::Float32(_) | ColumnValues::Float64(_) => None,
    }
}

/// Narrows already range-checked `i128` values into a typed integer column.
pub(crate) fn narrow_integers(
    target: TambakDataType,
    values: Vec<i128>,
) -> Result<ColumnValues, TambakError> {
    let narrowed = match target {
        TambakDataType::Int8 => ColumnValues::Int8(values.into_iter().map(|v| v as i8).collect()),
        TambakDataType::Int16 => ColumnValues::Int16(values.into_iter().map(|v| v as i16).collect()),
        TambakDataType::Int32 => ColumnValues::Int32(values.into_iter().map(|v| v as i32).collect()),
        TambakDataType::Int64 => ColumnValues::Int64(values.into_iter().map(|v| v as i64).collect()),
        TambakDataType::UInt8 => ColumnValues::UInt8(values.into_iter().map(|v| v as u8).collect()),
        TambakDataType::UInt16 => ColumnValues::UInt16(values.into_iter().map(|v| v as u16).collect()),
        TambakDataType::UInt32 => ColumnValues::UInt32(values.into_iter().map(|v| v as u32).collect()),
        TambakDataType::UInt64 => ColumnValues::UInt64(values.into_iter().map(|v| v as u64).collect()),
        other => {
            return Err(TambakError::InternalError(format!(
                "narrow_integers called with non-integer target {}",
                other
            )))
        }
    };
    Ok(narrowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_narrowing_in_range() {
        let values = ColumnValues::Int64(vec![-5, 0, 30_000]);
        let out = cast_values("s", "c", &values, None, TambakDataType::Int16, OverflowPolicy::Error)
            .unwrap();
        assert_eq!(out.values, ColumnValues::Int16(vec![-5, 0, 30_000]));
    }

    #[test]
    fn test_float_to_integer_truncates_toward_zero() {
        let values = ColumnValues::Float64(vec![1.9, -1.9, 100.4]);
        let out = cast_values("s", "c", &values, None, TambakDataType::Int16, OverflowPolicy::Error)
            .unwrap();
        assert_eq!(out.values, ColumnValues::Int16(vec![1, -1, 100]));
    }

    #[test]
    fn test_out_of_range_cast_is_codec_error_naming_column() {
        let values = ColumnValues::Int32(vec![70_000]);
        let err = cast_values("units", "x", &values, None, TambakDataType::Int16, OverflowPolicy::Error)
            .unwrap_err();
        match err {
            TambakError::Codec { stream, reason } => {
                assert_eq!(stream, "units");
                assert!(reason.contains("'x'"));
            }
            other => panic!("Expected Codec error, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_cast_clamps_when_configured() {
        let values = ColumnValues::Int32(vec![70_000, -1, 7]);
        let out = cast_values("s", "c", &values, None, TambakDataType::UInt16, OverflowPolicy::Clamp)
            .unwrap();
        assert_eq!(out.values, ColumnValues::UInt16(vec![65_535, 0, 7]));
        assert_eq!(out.clamped, 2);
    }

    #[test]
    fn test_null_rows_are_not_range_checked() {
        let values = ColumnValues::Float64(vec![f64::NAN, 3.0]);
        let validity = [false, true];
        let out = cast_values(
            "s",
            "c",
            &values,
            Some(&validity),
            TambakDataType::UInt8,
            OverflowPolicy::Error,
        )
        .unwrap();
        assert_eq!(out.values, ColumnValues::UInt8(vec![0, 3]));
    }

    #[test]
    fn test_boolean_conversions() {
        let bools = ColumnValues::Boolean(vec![true, false]);
        let out = cast_values("s", "c", &bools, None, TambakDataType::UInt8, OverflowPolicy::Error)
            .unwrap();
        assert_eq!(out.values, ColumnValues::UInt8(vec![1, 0]));

        let ints = ColumnValues::Int32(vec![0, -4]);
        let out = cast_values("s", "c", &ints, None, TambakDataType::Boolean, OverflowPolicy::Error)
            .unwrap();
        assert_eq!(out.values, ColumnValues::Boolean(vec![false, true]));
    }

    #[test]
    fn test_to_float_conversion() {
        let ints = ColumnValues::UInt16(vec![1, 65_535]);
        let out = cast_values("s", "c", &ints, None, TambakDataType::Float32, OverflowPolicy::Error)
            .unwrap();
        assert_eq!(out.values, ColumnValues::Float32(vec![1.0, 65_535.0]));
    }
}
