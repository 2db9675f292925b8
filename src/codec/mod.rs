// In: src/codec/mod.rs

//! Defines the behavioral contract shared by the binary layout codecs.
//!
//! A codec takes the transformed columns of one stream and produces freshly owned
//! raw blobs plus the stream's descriptor. It never compresses and never touches
//! contracts: by the time a codec runs, every column already has its final element
//! type and every null has been replaced by its sentinel.

pub mod columnar;
pub mod decode;
pub mod row_major;

pub use columnar::ColumnarCodec;
pub use row_major::RowMajorCodec;

use crate::contract::Layout;
use crate::error::TambakError;
use crate::schema::StreamDescriptor;
use crate::transform::TransformedColumn;

/// Rows written between two progress notifications when no batch size is given.
pub const DEFAULT_BATCH_ROWS: usize = 65_536;

/// The output of encoding one stream: its descriptor and its raw blobs, in the
/// order the descriptor references them.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedStream {
    pub descriptor: StreamDescriptor,
    pub blobs: Vec<(String, Vec<u8>)>,
}

impl EncodedStream {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn raw_size(&self) -> usize {
        self.blobs.iter().map(|(_, b)| b.len()).sum()
    }
}

/// A binary layout for a stream's transformed columns.
pub trait StreamCodec: Send + Sync {
    fn layout(&self) -> Layout;

    /// Encodes `columns` as stream `stream`.
    ///
    /// `on_batch` is called with the number of rows just written, only between row
    /// batches. Implementations must validate the whole stream before writing any
    /// byte.
    fn encode(
        &self,
        stream: &str,
        columns: &[TransformedColumn],
        on_batch: &mut dyn FnMut(usize),
    ) -> Result<EncodedStream, TambakError>;
}

/// Returns the codec implementing `layout`.
pub fn codec_for(layout: Layout, batch_rows: usize) -> Box<dyn StreamCodec> {
    match layout {
        Layout::Columnar => Box::new(ColumnarCodec::new(batch_rows)),
        Layout::RowMajor => Box::new(RowMajorCodec::new(batch_rows)),
    }
}

//==================================================================================
// Shared Helpers
//==================================================================================

/// The row count shared by every column, or a `Codec` error naming the lengths
/// when the stream is ragged.
pub(crate) fn uniform_row_count(
    stream: &str,
    columns: &[TransformedColumn],
) -> Result<usize, TambakError> {
    let rows = columns.first().map_or(0, |c| c.len());
    if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
        let lengths: Vec<String> = columns
            .iter()
            .map(|c| format!("{}={}", c.name, c.len()))
            .collect();
        return Err(TambakError::codec(
            stream,
            format!(
                "column '{}' has {} rows but the stream has {} (lengths: {})",
                bad.name,
                bad.len(),
                rows,
                lengths.join(", ")
            ),
        ));
    }
    Ok(rows)
}

/// Verifies that a finished blob has exactly the length its descriptor declares.
pub(crate) fn check_blob_len(
    stream: &str,
    key: &str,
    blob: &[u8],
    expected: usize,
) -> Result<(), TambakError> {
    if blob.len() == expected {
        Ok(())
    } else {
        Err(TambakError::codec(
            stream,
            format!(
                "blob '{}' is {} bytes but the descriptor declares {}",
                key,
                blob.len(),
                expected
            ),
        ))
    }
}

/// Splits `0..rows` into consecutive batches of at most `batch_rows` rows.
pub(crate) fn row_batches(rows: usize, batch_rows: usize) -> impl Iterator<Item = std::ops::Range<usize>> {
    let step = batch_rows.max(1);
    (0..rows)
        .step_by(step)
        .map(move |start| start..(start + step).min(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_batches_cover_every_row_once() {
        let batches: Vec<_> = row_batches(10, 4).collect();
        assert_eq!(batches, vec![0..4, 4..8, 8..10]);
        assert_eq!(row_batches(0, 4).count(), 0);
        assert_eq!(row_batches(3, 0).count(), 3);
    }
}
