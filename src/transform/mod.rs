//! The transform stage: applies one stream's `OutputContract` to its `Dataset`,
//! column by column, in declared order.
//!
//! Each column leaves this stage fully encodable: its final element type is known,
//! any scale has been resolved, and nulls have been replaced by their sentinel.
//! Codecs downstream only lay bytes out; they never look at contracts.

pub mod cast;
pub mod quantize;

use num_traits::NumCast;
use serde::{Deserialize, Serialize};

use crate::config::OverflowPolicy;
use crate::contract::{ColumnRule, OutputContract};
use crate::dataset::{Column, ColumnValues, Dataset};
use crate::error::TambakError;
use crate::types::TambakDataType;

//==================================================================================
// 1. Public Types
//==================================================================================

/// What was done to a column, as recorded in its descriptor for the decoder.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformMeta {
    /// Stored as-is in its declared dtype.
    None,
    /// Stored as `target_type`; read the value as-is.
    Cast { target_type: TambakDataType },
    /// Stored as an integer; reconstruct with `stored / scale`.
    Quantize {
        scale: f64,
        original_dtype: TambakDataType,
    },
}

/// A column after its rule has been applied, ready for a codec.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedColumn {
    pub name: String,
    pub values: ColumnValues,
    pub original_dtype: TambakDataType,
    pub transform: TransformMeta,
    /// The sentinel declared for nulls, if the contract declares one.
    pub null_encoding: Option<f64>,
    /// Values saturated under `OverflowPolicy::Clamp`.
    pub clamped_values: usize,
}

impl TransformedColumn {
    /// The post-transform element type written to the wire.
    pub fn dtype(&self) -> TambakDataType {
        self.values.dtype()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn byte_width(&self) -> usize {
        self.dtype().byte_width()
    }
}

//==================================================================================
// 2. Stream-Level Entry Point
//==================================================================================

/// Applies `contract` to every column of `dataset`, preserving column order.
///
/// Quantize and cast range violations follow `policy`. Columns holding nulls are
/// filled with their sentinel (column-level, then table-level). Float columns
/// without a sentinel store NaN; any other column without one is a `Codec` error.
pub fn apply_contract(
    stream: &str,
    dataset: &Dataset,
    contract: &OutputContract,
    policy: OverflowPolicy,
) -> Result<Vec<TransformedColumn>, TambakError> {
    dataset
        .columns()
        .iter()
        .map(|column| transform_column(stream, column, contract, policy))
        .collect()
}

fn transform_column(
    stream: &str,
    column: &Column,
    contract: &OutputContract,
    policy: OverflowPolicy,
) -> Result<TransformedColumn, TambakError> {
    let name = column.name();
    let validity = column.validity();
    let original_dtype = column.dtype();

    let (mut values, transform, clamped_values) = match contract.rule_for(name) {
        ColumnRule::None => (column.values().clone(), TransformMeta::None, 0),
        ColumnRule::Cast { to_type } => {
            let casted =
                cast::cast_values(stream, name, column.values(), validity, to_type, policy)?;
            (
                casted.values,
                TransformMeta::Cast {
                    target_type: to_type,
                },
                casted.clamped,
            )
        }
        ColumnRule::Quantize { to_type, scale } => {
            let raw = column.values().to_f64_vec();
            // Resolved once here, never recomputed while the stream encodes.
            let resolved = quantize::resolve_scale(name, scale, &raw, validity, to_type)?;
            let quantized = quantize::quantize(name, &raw, validity, to_type, resolved, policy)?;
            (
                quantized.values,
                TransformMeta::Quantize {
                    scale: quantized.scale,
                    original_dtype,
                },
                quantized.clamped,
            )
        }
    };

    if clamped_values > 0 {
        log::warn!(
            "Clamped {} value(s) of '{}.{}' to the {} range.",
            clamped_values,
            stream,
            name,
            values.dtype()
        );
    }

    let null_encoding = contract.null_encoding_for(name);
    if let Some(mask) = validity {
        let sentinel = match null_encoding {
            Some(sentinel) => {
                check_sentinel_fits(stream, name, sentinel, values.dtype())?;
                sentinel
            }
            None if values.dtype().is_float() => f64::NAN,
            None => {
                return Err(TambakError::codec(
                    stream,
                    format!(
                        "{}.{} ({}) has {} null(s) but no null_encoding rule",
                        stream,
                        name,
                        values.dtype(),
                        column.null_count()
                    ),
                ));
            }
        };
        fill_nulls(&mut values, mask, sentinel);
    }

    Ok(TransformedColumn {
        name: name.to_string(),
        values,
        original_dtype,
        transform,
        null_encoding,
        clamped_values,
    })
}

//==================================================================================
// 3. Null Handling
//==================================================================================

fn check_sentinel_fits(
    stream: &str,
    column: &str,
    sentinel: f64,
    dtype: TambakDataType,
) -> Result<(), TambakError> {
    let fits = match dtype.integer_bounds() {
        Some((min, max)) => {
            sentinel.fract() == 0.0 && (sentinel as i128) >= min && (sentinel as i128) <= max
        }
        None if dtype == TambakDataType::Boolean => sentinel == 0.0 || sentinel == 1.0,
        None if dtype == TambakDataType::Float32 => {
            sentinel.is_finite() && sentinel.abs() <= f32::MAX as f64
        }
        None => sentinel.is_finite(),
    };
    if fits {
        Ok(())
    } else {
        Err(TambakError::codec(
            stream,
            format!(
                "null_encoding {} for column '{}' is not representable as {}",
                sentinel, column, dtype
            ),
        ))
    }
}

/// Overwrites every null row with `sentinel`, converted to the column's type.
fn fill_nulls(values: &mut ColumnValues, mask: &[bool], sentinel: f64) {
    fn fill<T: NumCast + Copy>(data: &mut [T], mask: &[bool], sentinel: f64) {
        if let Some(fill) = <T as NumCast>::from(sentinel) {
            for (slot, _) in data.iter_mut().zip(mask).filter(|(_, &valid)| !valid) {
                *slot = fill;
            }
        }
    }

    match values {
        ColumnValues::Int8(v) => fill(v, mask, sentinel),
        ColumnValues::Int16(v) => fill(v, mask, sentinel),
        ColumnValues::Int32(v) => fill(v, mask, sentinel),
        ColumnValues::Int64(v) => fill(v, mask, sentinel),
        ColumnValues::UInt8(v) => fill(v, mask, sentinel),
        ColumnValues::UInt16(v) => fill(v, mask, sentinel),
        ColumnValues::UInt32(v) => fill(v, mask, sentinel),
        ColumnValues::UInt64(v) => fill(v, mask, sentinel),
        ColumnValues::Float32(v) => fill(v, mask, sentinel),
        ColumnValues::Float64(v) => fill(v, mask, sentinel),
        ColumnValues::Boolean(v) => {
            for (slot, _) in v.iter_mut().zip(mask).filter(|(_, &valid)| !valid) {
                *slot = sentinel != 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Layout, ScaleSpec};

    fn sample_dataset() -> Dataset {
        Dataset::new(vec![
            Column::new("frame", vec![1i64, 2, 3]),
            Column::new("value", vec![1.5f64, -2.25, 100.0]),
            Column::new("alive", vec![true, false, true]),
        ])
        .unwrap()
    }

    #[test]
    fn test_identity_contract_is_passthrough() {
        let ds = sample_dataset();
        let out = apply_contract("s", &ds, &OutputContract::identity(), OverflowPolicy::Error)
            .unwrap();
        assert_eq!(out.len(), 3);
        for (col, original) in out.iter().zip(ds.columns()) {
            assert_eq!(col.name, original.name());
            assert_eq!(col.dtype(), original.dtype());
            assert_eq!(col.transform, TransformMeta::None);
            assert_eq!(&col.values, original.values());
        }
    }

    #[test]
    fn test_rules_are_applied_in_declared_order() {
        let contract = OutputContract::identity()
            .with_layout(Layout::RowMajor)
            .with_rule(
                "frame",
                ColumnRule::Cast {
                    to_type: TambakDataType::UInt32,
                },
            )
            .with_rule(
                "value",
                ColumnRule::Quantize {
                    to_type: TambakDataType::Int16,
                    scale: ScaleSpec::Dynamic,
                },
            );
        let out = apply_contract("s", &sample_dataset(), &contract, OverflowPolicy::Error).unwrap();

        let names: Vec<_> = out.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["frame", "value", "alive"]);
        assert_eq!(out[0].values, ColumnValues::UInt32(vec![1, 2, 3]));
        assert_eq!(
            out[0].transform,
            TransformMeta::Cast {
                target_type: TambakDataType::UInt32
            }
        );
        match out[1].transform {
            TransformMeta::Quantize {
                scale,
                original_dtype,
            } => {
                assert!((scale - 327.67).abs() < 1e-9);
                assert_eq!(original_dtype, TambakDataType::Float64);
            }
            other => panic!("Expected quantize metadata, got {:?}", other),
        }
        assert_eq!(out[1].dtype(), TambakDataType::Int16);
    }

    #[test]
    fn test_nulls_without_sentinel_are_rejected_for_integers() {
        let ds = Dataset::new(vec![Column::new("id", vec![1u32, 0])
            .with_validity(vec![true, false])
            .unwrap()])
        .unwrap();
        let err = apply_contract("units", &ds, &OutputContract::identity(), OverflowPolicy::Error)
            .unwrap_err();
        match err {
            TambakError::Codec { stream, reason } => {
                assert_eq!(stream, "units");
                assert!(reason.contains("units.id"));
            }
            other => panic!("Expected Codec error, got {:?}", other),
        }
    }

    #[test]
    fn test_nulls_use_column_then_table_sentinel() {
        let ds = Dataset::new(vec![
            Column::new("a", vec![1u32, 9])
                .with_validity(vec![false, true])
                .unwrap(),
            Column::new("b", vec![1u32, 9])
                .with_validity(vec![true, false])
                .unwrap(),
        ])
        .unwrap();
        let mut contract = OutputContract::identity().with_null_encoding(0.0);
        contract.columns.insert(
            "a".into(),
            crate::contract::ColumnContract {
                rule: ColumnRule::None,
                null_encoding: Some(4_294_967_295.0),
            },
        );
        let out = apply_contract("s", &ds, &contract, OverflowPolicy::Error).unwrap();
        assert_eq!(out[0].values, ColumnValues::UInt32(vec![u32::MAX, 9]));
        assert_eq!(out[0].null_encoding, Some(4_294_967_295.0));
        assert_eq!(out[1].values, ColumnValues::UInt32(vec![1, 0]));
    }

    #[test]
    fn test_float_nulls_default_to_nan() {
        let ds = Dataset::new(vec![Column::new("v", vec![1.0f32, 2.0])
            .with_validity(vec![true, false])
            .unwrap()])
        .unwrap();
        let out = apply_contract("s", &ds, &OutputContract::identity(), OverflowPolicy::Error)
            .unwrap();
        match &out[0].values {
            ColumnValues::Float32(v) => {
                assert_eq!(v[0], 1.0);
                assert!(v[1].is_nan());
            }
            other => panic!("Unexpected values {:?}", other),
        }
    }

    #[test]
    fn test_unrepresentable_sentinel_is_rejected() {
        let ds = Dataset::new(vec![Column::new("v", vec![1u8, 2])
            .with_validity(vec![true, false])
            .unwrap()])
        .unwrap();
        let contract = OutputContract::identity().with_null_encoding(-1.0);
        assert!(matches!(
            apply_contract("s", &ds, &contract, OverflowPolicy::Error),
            Err(TambakError::Codec { .. })
        ));
    }

    #[test]
    fn test_float32_sentinel_must_fit_in_f32() {
        let ds = Dataset::new(vec![Column::new("v", vec![1.0f32, 2.0])
            .with_validity(vec![true, false])
            .unwrap()])
        .unwrap();
        let too_large = OutputContract::identity().with_null_encoding(1e40);
        assert!(matches!(
            apply_contract("s", &ds, &too_large, OverflowPolicy::Error),
            Err(TambakError::Codec { .. })
        ));

        let fits = OutputContract::identity().with_null_encoding(-65536.0);
        let out = apply_contract("s", &ds, &fits, OverflowPolicy::Error).unwrap();
        assert_eq!(out[0].values, ColumnValues::Float32(vec![1.0, -65536.0]));
    }
}
