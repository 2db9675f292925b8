//! This module contains the pure, stateless kernels for reversible quantization.
//!
//! A quantized column stores `round(raw * scale)` in a narrow integer type; a
//! decoder reconstructs `stored / scale`. The scale is resolved exactly once per
//! column, at the start of a stream's encode, and is recorded in the descriptor.

use crate::config::OverflowPolicy;
use crate::contract::ScaleSpec;
use crate::dataset::ColumnValues;
use crate::error::TambakError;
use crate::transform::cast::narrow_integers;
use crate::types::TambakDataType;

/// The output of quantizing one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantized {
    pub values: ColumnValues,
    pub scale: f64,
    /// Number of values saturated under `OverflowPolicy::Clamp`.
    pub clamped: usize,
}

//==================================================================================
// 1. Scale Resolution
//==================================================================================

/// Rejects zero, negative, and non-finite scales.
pub fn check_scale(column: &str, scale: f64) -> Result<f64, TambakError> {
    if scale.is_finite() && scale > 0.0 {
        Ok(scale)
    } else {
        Err(TambakError::quantization(
            column,
            format!("degenerate scale {} (must be finite and > 0)", scale),
        ))
    }
}

/// Resolves a `ScaleSpec` to a concrete scale for one column.
///
/// `Dynamic` maps the largest observed magnitude onto the largest value the target
/// can hold: `scale = max_representable / max(|min|, |max|)`. An empty or all-zero
/// column gets `scale = 1`. Null rows (`validity[i] == false`) are ignored.
pub fn resolve_scale(
    column: &str,
    spec: ScaleSpec,
    raw: &[f64],
    validity: Option<&[bool]>,
    target: TambakDataType,
) -> Result<f64, TambakError> {
    match spec {
        ScaleSpec::Static { scale } => check_scale(column, scale),
        ScaleSpec::Dynamic => {
            let (_, max) = target_bounds(column, target)?;
            let max_representable = target.max_representable().ok_or_else(|| {
                TambakError::quantization(column, format!("{} is not an integer type", target))
            })?;

            let mut max_abs = 0.0f64;
            for (row, &value) in raw.iter().enumerate() {
                if !is_present(validity, row) {
                    continue;
                }
                if !value.is_finite() {
                    return Err(TambakError::quantization(
                        column,
                        format!("non-finite value {} at row {}", value, row),
                    ));
                }
                max_abs = max_abs.max(value.abs());
            }

            if max_abs == 0.0 {
                return Ok(1.0);
            }

            // Magnitudes near the bottom of the f64 range overflow the ratio.
            let ratio = max_representable / max_abs;
            let mut scale = if ratio.is_finite() { ratio } else { f64::MAX };
            // Float rounding can push the extremum one step past the bound.
            while ((max_abs * scale).round() as i128) > max {
                scale = f64::from_bits(scale.to_bits() - 1);
            }
            check_scale(column, scale)
        }
    }
}

//==================================================================================
// 2. Quantize / Dequantize
//==================================================================================

/// Quantizes `raw` into the integer type `target` using an already resolved scale.
///
/// Null rows are written as `0` and are never range-checked; the null sentinel is
/// applied afterwards by the transform stage.
pub fn quantize(
    column: &str,
    raw: &[f64],
    validity: Option<&[bool]>,
    target: TambakDataType,
    scale: f64,
    policy: OverflowPolicy,
) -> Result<Quantized, TambakError> {
    let scale = check_scale(column, scale)?;
    let (min, max) = target_bounds(column, target)?;

    let mut clamped = 0usize;
    let mut stored = Vec::with_capacity(raw.len());
    for (row, &value) in raw.iter().enumerate() {
        if !is_present(validity, row) {
            stored.push(0i128);
            continue;
        }
        if !value.is_finite() {
            return Err(TambakError::quantization(
                column,
                format!("non-finite value {} at row {}", value, row),
            ));
        }
        let scaled = (value * scale).round();
        // `as i128` saturates, so an infinite product still lands out of range.
        let q = scaled as i128;
        if q < min || q > max {
            match policy {
                OverflowPolicy::Error => {
                    return Err(TambakError::quantization(
                        column,
                        format!(
                            "value {} at row {} quantizes to {}, outside the {} range [{}, {}]",
                            value, row, scaled, target, min, max
                        ),
                    ));
                }
                OverflowPolicy::Clamp => {
                    clamped += 1;
                    stored.push(q.clamp(min, max));
                }
            }
        } else {
            stored.push(q);
        }
    }

    Ok(Quantized {
        values: narrow_integers(target, stored)?,
        scale,
        clamped,
    })
}

/// Reconstructs an approximation of the original value: `stored / scale`.
#[inline]
pub fn dequantize(stored: f64, scale: f64) -> f64 {
    stored / scale
}

//==================================================================================
// 3. Private Helpers
//==================================================================================

#[inline]
fn is_present(validity: Option<&[bool]>, row: usize) -> bool {
    validity.map_or(true, |mask| mask[row])
}

fn target_bounds(column: &str, target: TambakDataType) -> Result<(i128, i128), TambakError> {
    target.integer_bounds().ok_or_else(|| {
        TambakError::quantization(
            column,
            format!("quantize target {} is not an integer type", target),
        )
    })
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
