//! Defines the self-describing container of a bundled artifact.
//! This module is the single source of truth for serializing and parsing the
//! envelope, including cheap inspection that never copies the blob payloads.
//!
//! The envelope is one MessagePack map, so any stock MessagePack decoder can read it:
//!
//! ```text
//! { "schema": <ArtifactSchema as a map>, "data": { <data_key>: <bin>, ... } }
//! ```
//!
//! Struct fields are written by name and every map is a `BTreeMap`, so equal
//! envelopes always give equal bytes. The envelope itself is uncompressed; the
//! packer compresses it as a whole.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_bytes::{ByteBuf, Bytes};

use crate::error::TambakError;
use crate::schema::ArtifactSchema;

//==================================================================================
// Public Structs
//==================================================================================

/// What `peek_info` reports about an envelope.
#[derive(Debug, PartialEq, Clone)]
pub struct EnvelopeInfo {
    pub schema: ArtifactSchema,
    /// `(data_key, blob_len)`, sorted by key.
    pub entries: Vec<(String, usize)>,
    /// The size of the whole envelope.
    pub envelope_size: usize,
    /// The sum of all blob lengths.
    pub data_size: usize,
}

/// A bundled artifact before compression: the schema document plus every blob.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub schema: ArtifactSchema,
    pub data: BTreeMap<String, Vec<u8>>,
}

//==================================================================================
// Wire Shapes
//==================================================================================

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    schema: &'a ArtifactSchema,
    data: BTreeMap<&'a str, &'a Bytes>,
}

#[derive(Deserialize)]
struct OwnedEnvelope {
    schema: ArtifactSchema,
    data: BTreeMap<String, ByteBuf>,
}

#[derive(Deserialize)]
struct BorrowedEnvelope<'a> {
    schema: ArtifactSchema,
    #[serde(borrow)]
    data: BTreeMap<&'a str, &'a Bytes>,
}

//==================================================================================
// Core Implementation
//==================================================================================

impl Envelope {
    /// Serializes the envelope into its canonical MessagePack form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TambakError> {
        let wire = EnvelopeRef {
            schema: &self.schema,
            data: self
                .data
                .iter()
                .map(|(key, blob)| (key.as_str(), Bytes::new(blob)))
                .collect(),
        };
        Ok(rmp_serde::to_vec_named(&wire)?)
    }

    /// Parses a complete envelope, copying every payload into memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TambakError> {
        let wire: OwnedEnvelope = rmp_serde::from_slice(bytes).map_err(decode_error)?;
        wire.schema.check_version()?;
        Ok(Self {
            schema: wire.schema,
            data: wire
                .data
                .into_iter()
                .map(|(key, blob)| (key, blob.into_vec()))
                .collect(),
        })
    }

    /// Parses the schema and the blob directory. Payloads are borrowed, not copied.
    pub fn peek_info(bytes: &[u8]) -> Result<EnvelopeInfo, TambakError> {
        let wire: BorrowedEnvelope<'_> = rmp_serde::from_slice(bytes).map_err(decode_error)?;
        wire.schema.check_version()?;

        let entries: Vec<(String, usize)> = wire
            .data
            .iter()
            .map(|(key, blob)| (key.to_string(), blob.len()))
            .collect();
        Ok(EnvelopeInfo {
            schema: wire.schema,
            data_size: entries.iter().map(|(_, len)| len).sum(),
            entries,
            envelope_size: bytes.len(),
        })
    }
}

fn decode_error(e: rmp_serde::decode::Error) -> TambakError {
    TambakError::EnvelopeFormat(format!("malformed MessagePack envelope: {}", e))
}

//==================================================================================
// Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArtifactFormat;

    fn create_test_envelope() -> Envelope {
        let mut data = BTreeMap::new();
        data.insert("zeta".to_string(), vec![9; 20]);
        data.insert("alpha".to_string(), vec![1; 100]);
        Envelope {
            schema: ArtifactSchema::new(ArtifactFormat::HybridBundle, Some("r1".into())),
            data,
        }
    }

    #[test]
    fn test_envelope_roundtrip_is_successful() {
        let original = create_test_envelope();
        let bytes = original.to_bytes().unwrap();
        assert_eq!(Envelope::from_bytes(&bytes).unwrap(), original);
        assert_eq!(bytes, original.to_bytes().unwrap());
    }

    #[test]
    fn test_envelope_is_a_plain_messagepack_map() {
        let bytes = create_test_envelope().to_bytes().unwrap();
        // fixmap with two entries: "schema" and "data".
        assert_eq!(bytes[0], 0x82);

        // A schema-agnostic reader: any value under each schema key.
        #[derive(Deserialize)]
        struct Generic {
            schema: BTreeMap<String, serde::de::IgnoredAny>,
            data: BTreeMap<String, ByteBuf>,
        }

        let generic: Generic = rmp_serde::from_slice(&bytes).unwrap();
        assert!(generic.schema.contains_key("schema_version"));
        assert!(generic.schema.contains_key("streams"));
        assert_eq!(generic.data["alpha"].as_slice(), &[1u8; 100][..]);
        assert_eq!(generic.data["zeta"].len(), 20);
    }

    #[test]
    fn test_peek_info_is_correct() {
        let bytes = create_test_envelope().to_bytes().unwrap();
        let info = Envelope::peek_info(&bytes).unwrap();

        assert_eq!(info.schema.artifact_id.as_deref(), Some("r1"));
        assert_eq!(info.data_size, 120);
        assert_eq!(info.envelope_size, bytes.len());
        assert!(info.envelope_size > info.data_size);
        assert_eq!(
            info.entries,
            vec![("alpha".to_string(), 100), ("zeta".to_string(), 20)]
        );
    }

    #[test]
    fn test_parsing_errors_are_handled_gracefully() {
        assert!(matches!(
            Envelope::peek_info(b"short"),
            Err(TambakError::EnvelopeFormat(_))
        ));
        assert!(matches!(
            Envelope::from_bytes(&[]),
            Err(TambakError::EnvelopeFormat(_))
        ));

        // Truncated payloads.
        let full = create_test_envelope().to_bytes().unwrap();
        assert!(matches!(
            Envelope::from_bytes(&full[..full.len() - 1]),
            Err(TambakError::EnvelopeFormat(_))
        ));
        assert!(matches!(
            Envelope::peek_info(&full[..full.len() / 2]),
            Err(TambakError::EnvelopeFormat(_))
        ));
    }

    #[test]
    fn test_unknown_schema_version_is_rejected() {
        let mut envelope = create_test_envelope();
        envelope.schema.schema_version = "0.1".into();
        let bytes = envelope.to_bytes().unwrap();
        assert!(matches!(
            Envelope::from_bytes(&bytes),
            Err(TambakError::EnvelopeFormat(_))
        ));
    }
}
