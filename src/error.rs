// In: src/error.rs

//! This module defines the single, unified error type for the entire export engine.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! The semantic variants follow the lifecycle of an export: configuration errors are
//! raised at startup, quantization and codec errors abort a single stream, and
//! packaging errors abort the whole artifact.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TambakError {
    // =========================================================================
    // === High-Level, Semantic Errors (Specific to the export engine)
    // =========================================================================
    /// Unknown column/dataset reference, invalid layout, or invalid target width.
    #[error("Contract configuration error: {0}")]
    ContractConfig(String),

    /// Non-positive/non-finite scale, or a value outside the target range.
    #[error("Quantization failed for column '{column}': {reason}")]
    Quantization { column: String, reason: String },

    /// Row-count mismatch, width mismatch, or an unencodable value in a stream.
    #[error("Codec error in stream '{stream}': {reason}")]
    Codec { stream: String, reason: String },

    /// Compression failure or a schema reference without a matching blob.
    #[error("Packaging failed for '{key}': {reason}")]
    Packaging { key: String, reason: String },

    /// A per-stream failure, tagged with the name of the stream that produced it.
    #[error("Stream '{stream}' failed: {source}")]
    Stream {
        stream: String,
        #[source]
        source: Box<TambakError>,
    },

    /// The upstream collaborator handed over a malformed dataset (duplicate column
    /// names, a validity vector of the wrong length, ...).
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    #[error("Envelope serialization/deserialization failed: {0}")]
    EnvelopeFormat(String),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the Arrow library.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically during schema serialization.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An error from the MessagePack encoder while writing a bundled envelope.
    #[error("MessagePack encoding failed: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error("Zstd operation failed: {0}")]
    ZstdError(String),
}

impl TambakError {
    /// Attaches a stream name to an error raised while encoding that stream.
    /// Errors that are already tagged are returned unchanged.
    pub fn in_stream(self, stream: &str) -> Self {
        match self {
            already @ TambakError::Stream { .. } => already,
            other => TambakError::Stream {
                stream: stream.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping any `Stream` wrappers.
    pub fn root(&self) -> &TambakError {
        match self {
            TambakError::Stream { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn quantization(column: &str, reason: impl Into<String>) -> Self {
        TambakError::Quantization {
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn codec(stream: &str, reason: impl Into<String>) -> Self {
        TambakError::Codec {
            stream: stream.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn packaging(key: &str, reason: impl Into<String>) -> Self {
        TambakError::Packaging {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
