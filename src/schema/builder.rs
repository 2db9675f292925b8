//! `SchemaDescriptorBuilder`: derives a stream's descriptor from the shape of its
//! transformed columns and its layout.
//!
//! The builder is the only place where data keys, byte offsets and strides are
//! assigned. Codecs ask it for the descriptor first and then lay bytes out exactly
//! as described, so the two can never disagree.

use crate::artifact::format::{columnar_data_key, row_major_data_key};
use crate::contract::Layout;
use crate::error::TambakError;
use crate::schema::{ColumnDescriptor, ColumnLocation, StreamDescriptor};
use crate::transform::TransformedColumn;

#[derive(Debug, Clone)]
pub struct SchemaDescriptorBuilder {
    stream: String,
    layout: Layout,
}

impl SchemaDescriptorBuilder {
    pub fn new(stream: impl Into<String>, layout: Layout) -> Self {
        Self {
            stream: stream.into(),
            layout,
        }
    }

    /// Builds the descriptor for `columns`, which must already share `num_rows`.
    ///
    /// The result is a pure function of the stream name, the layout, and each
    /// column's name, dtypes and transform metadata.
    pub fn build(
        &self,
        num_rows: usize,
        columns: &[TransformedColumn],
    ) -> Result<StreamDescriptor, TambakError> {
        let mut offset = 0usize;
        let mut descriptors = Vec::with_capacity(columns.len());
        for column in columns {
            let location = match self.layout {
                Layout::Columnar => ColumnLocation::DataKey {
                    data_key: columnar_data_key(&self.stream, &column.name),
                },
                Layout::RowMajor => ColumnLocation::ByteOffset {
                    byte_offset: offset,
                },
            };
            offset += column.byte_width();
            descriptors.push(ColumnDescriptor {
                name: column.name.clone(),
                dtype: column.dtype(),
                location,
                original_dtype: column.original_dtype,
                transform: column.transform,
                null_encoding: column.null_encoding,
                clamped_values: column.clamped_values,
            });
        }

        let descriptor = match self.layout {
            Layout::Columnar => StreamDescriptor {
                name: self.stream.clone(),
                layout: Layout::Columnar,
                num_rows,
                row_byte_stride: None,
                data_key: None,
                byte_size: num_rows * offset,
                columns: descriptors,
            },
            Layout::RowMajor => StreamDescriptor {
                name: self.stream.clone(),
                layout: Layout::RowMajor,
                num_rows,
                row_byte_stride: Some(offset),
                data_key: Some(row_major_data_key(&self.stream)),
                byte_size: num_rows * offset,
                columns: descriptors,
            },
        };

        descriptor.validate()?;
        Ok(descriptor)
    }
}
