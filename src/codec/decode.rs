//! The decode side of the wire format: rebuilds typed columns from a descriptor
//! and its raw blobs, and applies the value reconstruction rules.
//!
//! This is what an independent reader does; it relies on nothing but the
//! descriptor and the bytes.

use std::collections::BTreeMap;

use crate::contract::Layout;
use crate::dataset::ColumnValues;
use crate::error::TambakError;
use crate::schema::StreamDescriptor;
use crate::transform::quantize::dequantize;
use crate::transform::TransformMeta;
use crate::types::TambakDataType;

/// One column as read back from the wire, in its stored (post-transform) type.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedColumn {
    pub name: String,
    pub values: ColumnValues,
    pub transform: TransformMeta,
}

impl DecodedColumn {
    pub fn dtype(&self) -> TambakDataType {
        self.values.dtype()
    }
}

/// Decodes every column of `descriptor` from `data` (`data_key` → raw blob).
///
/// Missing blobs and blobs whose length disagrees with the descriptor are
/// `EnvelopeFormat` errors.
pub fn decode_stream(
    descriptor: &StreamDescriptor,
    data: &BTreeMap<String, Vec<u8>>,
) -> Result<Vec<DecodedColumn>, TambakError> {
    descriptor.validate()?;

    let mut blobs = BTreeMap::new();
    for (key, expected) in descriptor.expected_blobs()? {
        let blob = data.get(key).ok_or_else(|| {
            TambakError::EnvelopeFormat(format!(
                "stream '{}' references missing blob '{}'",
                descriptor.name, key
            ))
        })?;
        if blob.len() != expected {
            return Err(TambakError::EnvelopeFormat(format!(
                "blob '{}' is {} bytes, expected {}",
                key,
                blob.len(),
                expected
            )));
        }
        blobs.insert(key, blob.as_slice());
    }

    match descriptor.layout {
        Layout::Columnar => descriptor
            .columns
            .iter()
            .map(|column| {
                let key = column.data_key().unwrap_or_default();
                let blob = blobs.get(key).copied().unwrap_or_default();
                Ok(DecodedColumn {
                    name: column.name.clone(),
                    values: ColumnValues::from_le_bytes(column.dtype, blob),
                    transform: column.transform,
                })
            })
            .collect(),
        Layout::RowMajor => {
            let stride = descriptor.row_byte_stride.unwrap_or(0);
            let blob = descriptor
                .data_key
                .as_deref()
                .and_then(|key| blobs.get(key).copied())
                .unwrap_or_default();

            descriptor
                .columns
                .iter()
                .map(|column| {
                    let offset = column.byte_offset().unwrap_or(0);
                    let width = column.byte_width();
                    // Gather the column's bytes out of every row, then parse once.
                    let mut gathered = Vec::with_capacity(descriptor.num_rows * width);
                    for row in 0..descriptor.num_rows {
                        let start = row * stride + offset;
                        gathered.extend_from_slice(&blob[start..start + width]);
                    }
                    Ok(DecodedColumn {
                        name: column.name.clone(),
                        values: ColumnValues::from_le_bytes(column.dtype, &gathered),
                        transform: column.transform,
                    })
                })
                .collect()
        }
    }
}

/// Applies the value reconstruction rule: `stored / scale` for quantized
/// columns, the stored value otherwise.
pub fn reconstruct_f64(column: &DecodedColumn) -> Vec<f64> {
    let stored = column.values.to_f64_vec();
    match column.transform {
        TransformMeta::Quantize { scale, .. } => {
            stored.into_iter().map(|v| dequantize(v, scale)).collect()
        }
        TransformMeta::None | TransformMeta::Cast { .. } => stored,
    }
}
