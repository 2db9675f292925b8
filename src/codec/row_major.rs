//! The row-major (Array-of-Structures) codec.
//!
//! The whole stream becomes one contiguous buffer of fixed-stride rows. Row `i`
//! occupies `[i * stride, (i + 1) * stride)`; inside a row the columns follow each
//! other in declared order, little-endian, with no padding.

use crate::codec::{
    check_blob_len, row_batches, uniform_row_count, EncodedStream, StreamCodec,
    DEFAULT_BATCH_ROWS,
};
use crate::contract::Layout;
use crate::error::TambakError;
use crate::schema::SchemaDescriptorBuilder;
use crate::transform::TransformedColumn;

#[derive(Debug, Clone, Copy)]
pub struct RowMajorCodec {
    batch_rows: usize,
}

impl RowMajorCodec {
    pub fn new(batch_rows: usize) -> Self {
        Self { batch_rows }
    }
}

impl Default for RowMajorCodec {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_ROWS)
    }
}

impl StreamCodec for RowMajorCodec {
    fn layout(&self) -> Layout {
        Layout::RowMajor
    }

    fn encode(
        &self,
        stream: &str,
        columns: &[TransformedColumn],
        on_batch: &mut dyn FnMut(usize),
    ) -> Result<EncodedStream, TambakError> {
        // Both checks run before the buffer exists.
        let rows = uniform_row_count(stream, columns)?;
        let descriptor = SchemaDescriptorBuilder::new(stream, Layout::RowMajor).build(rows, columns)?;
        let (key, expected) = descriptor
            .expected_blobs()?
            .first()
            .map(|(key, len)| (key.to_string(), *len))
            .ok_or_else(|| {
                TambakError::InternalError(format!("row-major stream '{}' has no data key", stream))
            })?;

        let mut buffer = Vec::with_capacity(expected);
        for batch in row_batches(rows, self.batch_rows) {
            let batch_len = batch.len();
            for row in batch {
                for column in columns {
                    column.values.write_value_le(row, &mut buffer);
                }
            }
            on_batch(batch_len);
        }

        check_blob_len(stream, &key, &buffer, expected)?;
        Ok(EncodedStream {
            descriptor,
            blobs: vec![(key, buffer)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverflowPolicy;
    use crate::contract::OutputContract;
    use crate::dataset::{Column, Dataset};
    use crate::transform::apply_contract;

    fn columns_of(ds: &Dataset) -> Vec<TransformedColumn> {
        let contract = OutputContract::identity().with_layout(Layout::RowMajor);
        apply_contract("s", ds, &contract, OverflowPolicy::Error).unwrap()
    }

    #[test]
    fn test_two_rows_of_int32_and_float32() {
        let ds = Dataset::new(vec![
            Column::new("a", vec![7i32, -1]),
            Column::new("b", vec![0.5f32, 2.0]),
        ])
        .unwrap();
        let encoded = RowMajorCodec::default()
            .encode("s", &columns_of(&ds), &mut |_| {})
            .unwrap();

        assert_eq!(encoded.descriptor.row_byte_stride, Some(8));
        assert_eq!(encoded.blobs.len(), 1);
        let (key, blob) = &encoded.blobs[0];
        assert_eq!(key, "s_rows");
        assert_eq!(blob.len(), 16);
        assert_eq!(&blob[0..4], &7i32.to_le_bytes());
        assert_eq!(&blob[4..8], &0.5f32.to_le_bytes());
        assert_eq!(&blob[8..12], &(-1i32).to_le_bytes());
        assert_eq!(&blob[12..16], &2.0f32.to_le_bytes());
    }

    #[test]
    fn test_value_location_follows_stride_and_offset() {
        let ds = Dataset::new(vec![
            Column::new("flag", vec![true, false, true]),
            Column::new("id", vec![10u16, 20, 30]),
            Column::new("v", vec![1.25f64, 2.5, 3.75]),
        ])
        .unwrap();
        let encoded = RowMajorCodec::new(2)
            .encode("s", &columns_of(&ds), &mut |_| {})
            .unwrap();
        let d = &encoded.descriptor;
        let stride = d.row_byte_stride.unwrap();
        assert_eq!(stride, 1 + 2 + 8);

        let blob = &encoded.blobs[0].1;
        let v_offset = d.columns[2].byte_offset().unwrap();
        let at = 2 * stride + v_offset;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&blob[at..at + 8]);
        assert_eq!(f64::from_le_bytes(raw), 3.75);
        assert_eq!(blob[stride], 0);
    }

    #[test]
    fn test_mismatched_lengths_are_codec_error_with_no_output() {
        let ds = Dataset::new(vec![
            Column::new("a", vec![1i32; 5]),
            Column::new("b", vec![1i32; 6]),
        ])
        .unwrap();
        let mut rows_written = 0;
        let result =
            RowMajorCodec::default().encode("s", &columns_of(&ds), &mut |n| rows_written += n);
        match result {
            Err(TambakError::Codec { stream, reason }) => {
                assert_eq!(stream, "s");
                assert!(reason.contains("b=6"));
            }
            other => panic!("Expected Codec error, got {:?}", other),
        }
        assert_eq!(rows_written, 0);
    }
}
