//! The columnar (Structure-of-Arrays) codec.
//!
//! Every column becomes its own contiguous little-endian buffer of
//! `row_count * width` bytes, in row order, with no padding and no interleaving.

use crate::codec::{
    check_blob_len, row_batches, uniform_row_count, EncodedStream, StreamCodec,
    DEFAULT_BATCH_ROWS,
};
use crate::contract::Layout;
use crate::error::TambakError;
use crate::schema::SchemaDescriptorBuilder;
use crate::transform::TransformedColumn;

#[derive(Debug, Clone, Copy)]
pub struct ColumnarCodec {
    batch_rows: usize,
}

impl ColumnarCodec {
    pub fn new(batch_rows: usize) -> Self {
        Self { batch_rows }
    }
}

impl Default for ColumnarCodec {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_ROWS)
    }
}

impl StreamCodec for ColumnarCodec {
    fn layout(&self) -> Layout {
        Layout::Columnar
    }

    fn encode(
        &self,
        stream: &str,
        columns: &[TransformedColumn],
        on_batch: &mut dyn FnMut(usize),
    ) -> Result<EncodedStream, TambakError> {
        let rows = uniform_row_count(stream, columns)?;
        let descriptor = SchemaDescriptorBuilder::new(stream, Layout::Columnar).build(rows, columns)?;

        let mut buffers: Vec<Vec<u8>> = columns
            .iter()
            .map(|c| Vec::with_capacity(rows * c.byte_width()))
            .collect();

        for batch in row_batches(rows, self.batch_rows) {
            for (column, buffer) in columns.iter().zip(buffers.iter_mut()) {
                column.values.extend_le_range(batch.clone(), buffer);
            }
            on_batch(batch.len());
        }

        let mut blobs = Vec::with_capacity(columns.len());
        for ((key, expected), buffer) in descriptor.expected_blobs()?.into_iter().zip(buffers) {
            check_blob_len(stream, key, &buffer, expected)?;
            blobs.push((key.to_string(), buffer));
        }

        Ok(EncodedStream { descriptor, blobs })
    }
}
