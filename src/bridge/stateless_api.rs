// In: src/bridge/stateless_api.rs

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::artifact::envelope::Envelope;
use crate::artifact::BundledArtifact;
use crate::bridge::arrow_impl;
use crate::codec::decode::decode_stream;
use crate::config::ExportConfig;
use crate::contract::ContractRegistry;
use crate::dataset::NamedDataset;
use crate::error::TambakError;
use crate::kernels::zstd;
use crate::pipeline::{ExportEngine, ExportReport};

/// Summary of a bundled artifact, read without decoding any stream.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleStats {
    pub compressed_size: usize,
    /// Size of the decompressed MessagePack envelope.
    pub envelope_size: usize,
    pub data_size: usize,
    pub schema_json: String,
    pub data_keys: Vec<String>,
}

/// Exports named Arrow record batches in one call.
pub fn export_record_batches(
    batches: &[(&str, RecordBatch)],
    config: ExportConfig,
    contracts: ContractRegistry,
) -> Result<ExportReport, TambakError> {
    // 1. Marshall every batch into the engine's own dataset type.
    let datasets = batches
        .iter()
        .map(|(name, batch)| {
            arrow_impl::dataset_from_record_batch(batch)
                .map(|dataset| NamedDataset::new(*name, dataset))
        })
        .collect::<Result<Vec<_>, _>>()?;

    // 2. Run a one-shot engine.
    let engine = ExportEngine::new(Arc::new(config), Arc::new(contracts))?;
    engine.export(&datasets, None)
}

/// Decodes one stream of a bundled artifact into a `RecordBatch` of stored values.
///
/// Quantized columns come back as their stored integers; the scale is in the
/// artifact's schema.
pub fn decode_bundled_stream(bytes: &[u8], stream: &str) -> Result<RecordBatch, TambakError> {
    let opened = BundledArtifact::open(bytes)?;
    let descriptor = opened.schema.streams.get(stream).ok_or_else(|| {
        TambakError::EnvelopeFormat(format!("artifact has no stream named '{}'", stream))
    })?;

    let columns = decode_stream(descriptor, &opened.data)?;
    let fields: Vec<Field> = columns
        .iter()
        .map(|c| Field::new(c.name.as_str(), c.dtype().to_arrow_type(), false))
        .collect();
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|c| arrow_impl::column_values_to_array(&c.values, None))
        .collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Reads the schema and blob directory of a bundled artifact without decoding
/// any stream.
pub fn analyze_bundle(bytes: &[u8]) -> Result<BundleStats, TambakError> {
    let raw = zstd::decompress(bytes)?;
    let info = Envelope::peek_info(&raw)?;
    Ok(BundleStats {
        compressed_size: bytes.len(),
        envelope_size: info.envelope_size,
        data_size: info.data_size,
        schema_json: info.schema.to_json_pretty()?,
        data_keys: info.entries.into_iter().map(|(key, _)| key).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use arrow::array::{Array, Int32Array};
    use arrow::datatypes::DataType;

    #[test]
    fn test_analyze_bundle_after_export() {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int32, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(Int32Array::from(vec![10, 20, 30])) as ArrayRef],
        )
        .unwrap();

        let report =
            export_record_batches(&[("s", batch)], ExportConfig::default(), ContractRegistry::new())
                .unwrap();
        let bytes = match report.artifact {
            Artifact::Bundled(bundle) => bundle.bytes,
            other => panic!("Expected bundled artifact, got {:?}", other),
        };

        let stats = analyze_bundle(&bytes).unwrap();
        assert_eq!(stats.compressed_size, bytes.len());
        assert_eq!(stats.data_keys, vec!["s__v_bin".to_string()]);
        assert_eq!(stats.data_size, 12);
        assert!(stats.schema_json.contains("\"s\""));
        assert!(stats.envelope_size > stats.data_size);

        let decoded = decode_bundled_stream(&bytes, "s").unwrap();
        let v = decoded.column(0).as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(v.values().to_vec(), vec![10, 20, 30]);
        assert!(matches!(
            decode_bundled_stream(&bytes, "other"),
            Err(TambakError::EnvelopeFormat(_))
        ));
    }
}
