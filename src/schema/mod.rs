//! The schema descriptor documents: the authoritative description of how to decode
//! each stream's bytes, and the artifact-level document merging them.
//!
//! Every map in this module is a `BTreeMap` and every struct serializes its fields in
//! declaration order, so serializing the same descriptor twice always yields the same
//! bytes. Nothing time- or environment-dependent is ever recorded.

pub mod builder;

pub use builder::SchemaDescriptorBuilder;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::artifact::format::SCHEMA_VERSION;
use crate::config::ArtifactFormat;
use crate::contract::Layout;
use crate::error::TambakError;
use crate::transform::TransformMeta;
use crate::types::TambakDataType;

//==================================================================================
// 1. Column & Stream Descriptors
//==================================================================================

/// Where a column's values live.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ColumnLocation {
    /// Columnar: the column owns the blob stored under `data_key`.
    DataKey { data_key: String },
    /// Row-major: the column starts `byte_offset` bytes into every row.
    ByteOffset { byte_offset: usize },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// The post-transform element type, i.e. what is on the wire.
    pub dtype: TambakDataType,
    #[serde(flatten)]
    pub location: ColumnLocation,
    /// The element type the column had before its rule was applied.
    pub original_dtype: TambakDataType,
    pub transform: TransformMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_encoding: Option<f64>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub clamped_values: usize,
}

impl ColumnDescriptor {
    pub fn byte_width(&self) -> usize {
        self.dtype.byte_width()
    }

    pub fn data_key(&self) -> Option<&str> {
        match &self.location {
            ColumnLocation::DataKey { data_key } => Some(data_key),
            ColumnLocation::ByteOffset { .. } => None,
        }
    }

    pub fn byte_offset(&self) -> Option<usize> {
        match self.location {
            ColumnLocation::ByteOffset { byte_offset } => Some(byte_offset),
            ColumnLocation::DataKey { .. } => None,
        }
    }
}

/// The complete description of one encoded stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub name: String,
    pub layout: Layout,
    pub num_rows: usize,
    /// Row-major only: the byte length of one row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_byte_stride: Option<usize>,
    /// Row-major only: the key of the stream's single blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_key: Option<String>,
    /// Total raw (uncompressed) bytes of all the stream's blobs.
    pub byte_size: usize,
    /// Column metadata in the dataset's declared order.
    pub columns: Vec<ColumnDescriptor>,
}

impl StreamDescriptor {
    /// Every blob this stream references, with its exact expected raw length.
    /// Fails if a length does not fit in `usize`.
    pub fn expected_blobs(&self) -> Result<Vec<(&str, usize)>, TambakError> {
        let blob_len = |width: usize| {
            self.num_rows.checked_mul(width).ok_or_else(|| {
                TambakError::codec(
                    &self.name,
                    format!("{} rows of {} bytes overflow usize", self.num_rows, width),
                )
            })
        };
        match self.layout {
            Layout::RowMajor => self
                .data_key
                .as_deref()
                .map(|key| Ok((key, blob_len(self.row_byte_stride.unwrap_or(0))?)))
                .into_iter()
                .collect(),
            Layout::Columnar => self
                .columns
                .iter()
                .filter_map(|c| c.data_key().map(|key| Ok((key, blob_len(c.byte_width())?))))
                .collect(),
        }
    }

    /// The data keys this stream references.
    pub fn data_keys(&self) -> Vec<&str> {
        match self.layout {
            Layout::RowMajor => self.data_key.as_deref().into_iter().collect(),
            Layout::Columnar => self.columns.iter().filter_map(|c| c.data_key()).collect(),
        }
    }

    /// Checks the layout invariants a decoder relies on: row-major strides equal
    /// the sum of column widths and each offset equals the widths before it;
    /// columnar columns each own a distinct data key.
    pub fn validate(&self) -> Result<(), TambakError> {
        let fail = |reason: String| Err(TambakError::codec(&self.name, reason));
        match self.layout {
            Layout::RowMajor => {
                let mut expected_offset = 0usize;
                for column in &self.columns {
                    match column.byte_offset() {
                        Some(offset) if offset == expected_offset => {}
                        Some(offset) => {
                            return fail(format!(
                                "column '{}' declares byte_offset {} but the preceding widths sum to {}",
                                column.name, offset, expected_offset
                            ))
                        }
                        None => {
                            return fail(format!(
                                "row-major column '{}' has no byte_offset",
                                column.name
                            ))
                        }
                    }
                    expected_offset = expected_offset
                        .checked_add(column.byte_width())
                        .ok_or_else(|| TambakError::codec(&self.name, "row width overflows usize"))?;
                }
                if self.row_byte_stride != Some(expected_offset) {
                    return fail(format!(
                        "row_byte_stride {:?} does not equal the sum of column widths {}",
                        self.row_byte_stride, expected_offset
                    ));
                }
                if self.data_key.is_none() {
                    return fail("row-major stream has no data_key".into());
                }
            }
            Layout::Columnar => {
                if self.row_byte_stride.is_some() || self.data_key.is_some() {
                    return fail("columnar stream declares row-major fields".into());
                }
                let mut seen = std::collections::BTreeSet::new();
                for column in &self.columns {
                    match column.data_key() {
                        Some(key) if seen.insert(key) => {}
                        Some(key) => return fail(format!("duplicate data_key '{}'", key)),
                        None => {
                            return fail(format!("columnar column '{}' has no data_key", column.name))
                        }
                    }
                }
            }
        }

        let declared = self
            .expected_blobs()?
            .iter()
            .try_fold(0usize, |total, (_, len)| total.checked_add(*len))
            .ok_or_else(|| TambakError::codec(&self.name, "declared blob lengths overflow usize"))?;
        if declared != self.byte_size {
            return fail(format!(
                "byte_size {} does not match the declared blob lengths {}",
                self.byte_size, declared
            ));
        }
        Ok(())
    }

    /// The canonical serialized form. Identical descriptors give identical bytes.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, TambakError> {
        Ok(serde_json::to_vec(self)?)
    }
}

//==================================================================================
// 2. Artifact Schema
//==================================================================================

/// The schema document of a whole artifact.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArtifactSchema {
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    pub layout_format: ArtifactFormat,
    /// Keys of opaque caller blobs stored alongside the streams (bundled only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_assets: Vec<String>,
    pub streams: BTreeMap<String, StreamDescriptor>,
    /// Split only: `data_key` → file name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, String>,
}

impl ArtifactSchema {
    pub fn new(layout_format: ArtifactFormat, artifact_id: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            artifact_id,
            layout_format,
            static_assets: Vec::new(),
            streams: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    /// Adds a stream descriptor. Stream names are unique within an artifact.
    pub fn insert_stream(&mut self, descriptor: StreamDescriptor) -> Result<(), TambakError> {
        if self.streams.contains_key(&descriptor.name) {
            return Err(TambakError::packaging(
                &descriptor.name,
                "stream name appears twice in one artifact",
            ));
        }
        self.streams.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Every key the schema expects a blob for, with its expected raw length
    /// (`None` for static assets, whose length is opaque).
    pub fn referenced_keys(&self) -> Result<Vec<(&str, Option<usize>)>, TambakError> {
        let mut keys = Vec::new();
        for stream in self.streams.values() {
            keys.extend(
                stream
                    .expected_blobs()?
                    .into_iter()
                    .map(|(key, len)| (key, Some(len))),
            );
        }
        keys.extend(self.static_assets.iter().map(|k| (k.as_str(), None)));
        Ok(keys)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, TambakError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, TambakError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, TambakError> {
        let schema: Self = serde_json::from_slice(bytes)?;
        schema.check_version()?;
        Ok(schema)
    }

    /// Readers only understand the current schema version.
    pub fn check_version(&self) -> Result<(), TambakError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(TambakError::EnvelopeFormat(format!(
                "Unsupported schema version: expected {}, got {}",
                SCHEMA_VERSION, self.schema_version
            )));
        }
        Ok(())
    }
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}
