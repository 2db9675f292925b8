//! `ArtifactPacker`: assembles encoded streams into the final artifact.
//!
//! Bundled mode merges every descriptor into one schema and every blob into one
//! data map, wraps both in an `Envelope` and compresses the complete envelope once.
//! Split mode compresses each blob on its own into an independently named file and
//! writes the schema as a standalone document. Either way the referential integrity
//! of the schema is checked before anything is returned.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::artifact::envelope::Envelope;
use crate::artifact::format::{blob_file_name, check_file_name, SCHEMA_FILE_NAME};
use crate::codec::EncodedStream;
use crate::config::{ArtifactFormat, ExportConfig};
use crate::contract::Layout;
use crate::error::TambakError;
use crate::kernels::zstd;
use crate::schema::{ArtifactSchema, StreamDescriptor};

//==================================================================================
// 1. Artifact Types
//==================================================================================

/// A single self-describing, zstd-compressed envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct BundledArtifact {
    pub schema: ArtifactSchema,
    /// The compressed envelope, ready to be written or streamed.
    pub bytes: Vec<u8>,
}

/// A schema document plus one compressed file per stream (row-major) or per
/// column (columnar).
#[derive(Debug, Clone, PartialEq)]
pub struct SplitArtifact {
    pub schema: ArtifactSchema,
    /// The pretty-printed `schema.json` document.
    pub schema_json: String,
    /// File name → compressed blob.
    pub files: BTreeMap<String, Vec<u8>>,
}

/// The packaged output of one export.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Bundled(BundledArtifact),
    Split(SplitArtifact),
}

impl Artifact {
    pub fn schema(&self) -> &ArtifactSchema {
        match self {
            Artifact::Bundled(b) => &b.schema,
            Artifact::Split(s) => &s.schema,
        }
    }
}

/// A schema together with its raw (decompressed) blobs, as a reader sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedArtifact {
    pub schema: ArtifactSchema,
    pub data: BTreeMap<String, Vec<u8>>,
}

/// One stream whose blobs have already been compressed for a split artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitStream {
    pub descriptor: StreamDescriptor,
    /// `(data_key, compressed blob)` in descriptor order.
    pub blobs: Vec<(String, Vec<u8>)>,
}

//==================================================================================
// 2. The Packer
//==================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPacker {
    format: ArtifactFormat,
    level: i32,
    artifact_id: Option<String>,
}

impl ArtifactPacker {
    pub fn new(format: ArtifactFormat, level: i32, artifact_id: Option<String>) -> Self {
        Self {
            format,
            level,
            artifact_id,
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(
            config.format,
            config.effective_zstd_level(),
            config.artifact_id.clone(),
        )
    }

    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    /// Whether streams of `layout` belong in this packer's format. Bundles take
    /// every stream; each split format only takes its own layout.
    pub fn accepts(&self, layout: Layout) -> bool {
        match self.format {
            ArtifactFormat::HybridBundle => true,
            ArtifactFormat::RowMajorSplit => layout == Layout::RowMajor,
            ArtifactFormat::ColumnarSplit => layout == Layout::Columnar,
        }
    }

    /// Packages fully encoded streams in the configured format.
    pub fn pack(
        &self,
        streams: Vec<EncodedStream>,
        static_assets: BTreeMap<String, Vec<u8>>,
    ) -> Result<Artifact, TambakError> {
        match self.format {
            ArtifactFormat::HybridBundle => {
                Ok(Artifact::Bundled(self.pack_bundled(streams, static_assets)?))
            }
            ArtifactFormat::RowMajorSplit | ArtifactFormat::ColumnarSplit => {
                if !static_assets.is_empty() {
                    log::warn!(
                        "Ignoring {} static asset(s): only bundled artifacts carry them.",
                        static_assets.len()
                    );
                }
                let compressed = streams
                    .into_iter()
                    .map(|s| self.compress_stream(s))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Artifact::Split(self.pack_split(compressed)?))
            }
        }
    }

    /// Bundled mode. Needs every stream's bytes at once: the whole envelope is
    /// compressed in a single pass.
    pub fn pack_bundled(
        &self,
        streams: Vec<EncodedStream>,
        static_assets: BTreeMap<String, Vec<u8>>,
    ) -> Result<BundledArtifact, TambakError> {
        let mut schema = ArtifactSchema::new(ArtifactFormat::HybridBundle, self.artifact_id.clone());
        let mut data = BTreeMap::new();

        for stream in streams {
            for (key, blob) in stream.blobs {
                insert_unique(&mut data, key, blob)?;
            }
            schema.insert_stream(stream.descriptor)?;
        }
        for (key, blob) in static_assets {
            if data.contains_key(&key) {
                return Err(TambakError::packaging(
                    &key,
                    "static asset name collides with a stream data_key",
                ));
            }
            schema.static_assets.push(key.clone());
            data.insert(key, blob);
        }

        let raw_sizes: BTreeMap<&str, usize> =
            data.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        verify_references(&schema, &raw_sizes, true)?;

        let envelope = Envelope { schema, data };
        let raw = envelope.to_bytes()?;
        let schema = envelope.schema;
        let bytes = zstd::compress(&raw, self.level)
            .map_err(|e| TambakError::packaging("<envelope>", e.to_string()))?;

        log::info!(
            "Packed bundle: {} stream(s), {} -> {} bytes (zstd level {}).",
            schema.streams.len(),
            raw.len(),
            bytes.len(),
            self.level
        );
        log_metric!(
            "event" = "pack_bundled",
            "streams" = schema.streams.len(),
            "raw_bytes" = raw.len(),
            "compressed_bytes" = bytes.len()
        );

        Ok(BundledArtifact { schema, bytes })
    }

    /// Compresses every blob of one stream for a split artifact. Split mode has no
    /// barrier, so this runs as soon as the stream is encoded.
    pub fn compress_stream(&self, stream: EncodedStream) -> Result<SplitStream, TambakError> {
        if !self.accepts(stream.descriptor.layout) {
            return Err(TambakError::packaging(
                stream.name(),
                format!(
                    "{:?} stream does not belong in a {:?} artifact",
                    stream.descriptor.layout, self.format
                ),
            ));
        }
        let expected: BTreeMap<&str, usize> =
            stream.descriptor.expected_blobs()?.into_iter().collect();

        let mut blobs = Vec::with_capacity(stream.blobs.len());
        for (key, raw) in &stream.blobs {
            if expected.get(key.as_str()) != Some(&raw.len()) {
                return Err(TambakError::packaging(
                    key,
                    format!("raw blob of {} bytes does not match its descriptor", raw.len()),
                ));
            }
            let compressed = zstd::compress(raw, self.level)
                .map_err(|e| TambakError::packaging(key, e.to_string()))?;
            blobs.push((key.clone(), compressed));
        }

        Ok(SplitStream {
            descriptor: stream.descriptor,
            blobs,
        })
    }

    /// Split mode: one standalone schema document plus one file per blob.
    pub fn pack_split(&self, streams: Vec<SplitStream>) -> Result<SplitArtifact, TambakError> {
        let mut schema = ArtifactSchema::new(self.format, self.artifact_id.clone());
        let mut by_key = BTreeMap::new();

        for stream in streams {
            for (key, blob) in stream.blobs {
                insert_unique(&mut by_key, key, blob)?;
            }
            schema.insert_stream(stream.descriptor)?;
        }

        let present: BTreeMap<&str, usize> =
            by_key.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        // Compressed lengths say nothing about raw lengths; only presence is checked.
        verify_references(&schema, &present, false)?;

        let mut files = BTreeMap::new();
        for (key, blob) in by_key {
            let file_name = blob_file_name(&key);
            check_file_name(&file_name)?;
            schema.files.insert(key, file_name.clone());
            files.insert(file_name, blob);
        }
        let schema_json = schema.to_json_pretty()?;

        log::info!(
            "Packed split artifact ({:?}): {} stream(s), {} file(s).",
            self.format,
            schema.streams.len(),
            files.len()
        );

        Ok(SplitArtifact {
            schema,
            schema_json,
            files,
        })
    }
}

//==================================================================================
// 3. Persistence & Reading Back
//==================================================================================

impl BundledArtifact {
    /// Writes the compressed envelope to `path`.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), TambakError> {
        fs::write(path, &self.bytes)?;
        Ok(())
    }

    /// Decompresses and parses a bundled artifact.
    pub fn open(bytes: &[u8]) -> Result<OpenedArtifact, TambakError> {
        let raw = zstd::decompress(bytes)?;
        let Envelope { schema, data } = Envelope::from_bytes(&raw)?;

        let sizes: BTreeMap<&str, usize> = data.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        verify_references(&schema, &sizes, true)
            .map_err(|e| TambakError::EnvelopeFormat(e.to_string()))?;

        Ok(OpenedArtifact { schema, data })
    }
}

impl SplitArtifact {
    /// Writes `schema.json` and every blob file into `dir`, creating it if needed.
    pub fn persist(&self, dir: impl AsRef<Path>) -> Result<(), TambakError> {
        let dir = dir.as_ref();
        for name in self.files.keys() {
            check_file_name(name)?;
        }
        fs::create_dir_all(dir)?;
        fs::write(dir.join(SCHEMA_FILE_NAME), &self.schema_json)?;
        for (name, blob) in &self.files {
            fs::write(dir.join(name), blob)?;
        }
        Ok(())
    }

    /// Reads a persisted split artifact back, decompressing every referenced file.
    pub fn open_dir(dir: impl AsRef<Path>) -> Result<OpenedArtifact, TambakError> {
        let dir = dir.as_ref();
        let schema = ArtifactSchema::from_json_slice(&fs::read(dir.join(SCHEMA_FILE_NAME))?)?;

        let mut data = BTreeMap::new();
        for (key, file_name) in &schema.files {
            check_file_name(file_name).map_err(|e| TambakError::EnvelopeFormat(e.to_string()))?;
            let raw = zstd::decompress(&fs::read(dir.join(file_name))?)?;
            data.insert(key.clone(), raw);
        }

        let sizes: BTreeMap<&str, usize> = data.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        verify_references(&schema, &sizes, true)
            .map_err(|e| TambakError::EnvelopeFormat(e.to_string()))?;

        Ok(OpenedArtifact { schema, data })
    }
}

//==================================================================================
// 4. Private Helpers
//==================================================================================

fn insert_unique(
    data: &mut BTreeMap<String, Vec<u8>>,
    key: String,
    blob: Vec<u8>,
) -> Result<(), TambakError> {
    if data.contains_key(&key) {
        return Err(TambakError::packaging(&key, "data_key produced by more than one stream"));
    }
    data.insert(key, blob);
    Ok(())
}

/// Every key the schema references must have exactly one blob, and every blob
/// must be referenced. With `check_lengths`, raw lengths must match too.
fn verify_references(
    schema: &ArtifactSchema,
    blobs: &BTreeMap<&str, usize>,
    check_lengths: bool,
) -> Result<(), TambakError> {
    let referenced = schema.referenced_keys()?;
    for (key, expected) in &referenced {
        match (blobs.get(key), expected) {
            (None, _) => {
                return Err(TambakError::packaging(
                    key,
                    "referenced by the schema but no blob exists",
                ))
            }
            (Some(actual), Some(expected)) if check_lengths && actual != expected => {
                return Err(TambakError::packaging(
                    key,
                    format!("blob is {} bytes but the schema declares {}", actual, expected),
                ))
            }
            _ => {}
        }
    }
    if referenced.len() != blobs.len() {
        if let Some(orphan) = blobs
            .keys()
            .find(|k| !referenced.iter().any(|(r, _)| r == *k))
        {
            return Err(TambakError::packaging(orphan, "blob is not referenced by the schema"));
        }
        return Err(TambakError::packaging(
            "<schema>",
            "a data_key is referenced more than once",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ColumnarCodec, RowMajorCodec, StreamCodec};
    use crate::config::OverflowPolicy;
    use crate::contract::OutputContract;
    use crate::dataset::{Column, Dataset};
    use crate::transform::apply_contract;

    fn encoded(name: &str, layout: Layout) -> EncodedStream {
        let ds = Dataset::new(vec![
            Column::new("a", vec![1i32, 2, 3]),
            Column::new("b", vec![0.5f64, 1.5, 2.5]),
        ])
        .unwrap();
        let contract = OutputContract::identity().with_layout(layout);
        let columns = apply_contract(name, &ds, &contract, OverflowPolicy::Error).unwrap();
        match layout {
            Layout::Columnar => ColumnarCodec::default().encode(name, &columns, &mut |_| {}),
            Layout::RowMajor => RowMajorCodec::default().encode(name, &columns, &mut |_| {}),
        }
        .unwrap()
    }

    #[test]
    fn test_bundle_roundtrip_through_open() {
        let packer = ArtifactPacker::new(ArtifactFormat::HybridBundle, 3, Some("r1".into()));
        let mut assets = BTreeMap::new();
        assets.insert("game_meta".to_string(), b"{\"map\":\"x\"}".to_vec());

        let bundle = packer
            .pack_bundled(
                vec![encoded("units", Layout::Columnar), encoded("pos", Layout::RowMajor)],
                assets,
            )
            .unwrap();
        // A plain zstd frame wraps the whole envelope.
        assert_eq!(&bundle.bytes[..4], &[0x28, 0xB5, 0x2F, 0xFD]);

        let opened = BundledArtifact::open(&bundle.bytes).unwrap();
        assert_eq!(opened.schema, bundle.schema);
        assert_eq!(opened.schema.artifact_id.as_deref(), Some("r1"));
        assert_eq!(opened.schema.static_assets, vec!["game_meta".to_string()]);
        let keys: Vec<_> = opened.data.keys().cloned().collect();
        assert_eq!(keys, vec!["game_meta", "pos_rows", "units__a_bin", "units__b_bin"]);
        assert_eq!(opened.data["pos_rows"].len(), 3 * 12);
    }

    #[test]
    fn test_bundle_is_deterministic() {
        let packer = ArtifactPacker::new(ArtifactFormat::HybridBundle, 3, None);
        let first = packer
            .pack_bundled(vec![encoded("s", Layout::Columnar)], BTreeMap::new())
            .unwrap();
        let second = packer
            .pack_bundled(vec![encoded("s", Layout::Columnar)], BTreeMap::new())
            .unwrap();
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn test_static_asset_collision_is_packaging_error() {
        let packer = ArtifactPacker::new(ArtifactFormat::HybridBundle, 3, None);
        let mut assets = BTreeMap::new();
        assets.insert("s_rows".to_string(), vec![1]);
        match packer.pack_bundled(vec![encoded("s", Layout::RowMajor)], assets) {
            Err(TambakError::Packaging { key, .. }) => assert_eq!(key, "s_rows"),
            other => panic!("Expected Packaging error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_blob_is_named_in_packaging_error() {
        let packer = ArtifactPacker::new(ArtifactFormat::HybridBundle, 3, None);
        let mut stream = encoded("s", Layout::Columnar);
        stream.blobs.retain(|(k, _)| k != "s__b_bin");
        match packer.pack_bundled(vec![stream], BTreeMap::new()) {
            Err(TambakError::Packaging { key, .. }) => assert_eq!(key, "s__b_bin"),
            other => panic!("Expected Packaging error, got {:?}", other),
        }
    }

    #[test]
    fn test_split_columnar_persist_and_reopen() {
        let packer = ArtifactPacker::new(ArtifactFormat::ColumnarSplit, 3, None);
        let artifact = match packer
            .pack(vec![encoded("units", Layout::Columnar)], BTreeMap::new())
            .unwrap()
        {
            Artifact::Split(split) => split,
            other => panic!("Expected split artifact, got {:?}", other),
        };
        let names: Vec<_> = artifact.files.keys().cloned().collect();
        assert_eq!(names, vec!["units__a_bin.bin.zst", "units__b_bin.bin.zst"]);
        assert_eq!(artifact.schema.files["units__a_bin"], "units__a_bin.bin.zst");

        let dir = tempfile::tempdir().unwrap();
        artifact.persist(dir.path()).unwrap();
        assert!(dir.path().join("schema.json").exists());

        let opened = SplitArtifact::open_dir(dir.path()).unwrap();
        assert_eq!(opened.schema, artifact.schema);
        assert_eq!(opened.data["units__a_bin"].len(), 12);
        assert_eq!(opened.data["units__b_bin"].len(), 24);
    }

    #[test]
    fn test_oversized_row_count_in_bundle_is_rejected_on_open() {
        let mut stream = encoded("s", Layout::RowMajor);
        stream.descriptor.num_rows = 1 << (usize::BITS - 1);
        let mut schema = ArtifactSchema::new(ArtifactFormat::HybridBundle, None);
        schema.insert_stream(stream.descriptor).unwrap();
        let envelope = Envelope {
            schema,
            data: BTreeMap::from([("s_rows".to_string(), Vec::new())]),
        };
        let bytes = zstd::compress(&envelope.to_bytes().unwrap(), 3).unwrap();

        assert!(matches!(
            BundledArtifact::open(&bytes),
            Err(TambakError::EnvelopeFormat(_))
        ));
    }

    #[test]
    fn test_split_file_names_cannot_leave_the_directory() {
        let packer = ArtifactPacker::new(ArtifactFormat::ColumnarSplit, 3, None);
        assert!(matches!(
            packer.pack(vec![encoded("../escaped", Layout::Columnar)], BTreeMap::new()),
            Err(TambakError::Packaging { .. })
        ));

        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("artifact");
        let mut artifact = match packer
            .pack(vec![encoded("units", Layout::Columnar)], BTreeMap::new())
            .unwrap()
        {
            Artifact::Split(split) => split,
            other => panic!("Expected split artifact, got {:?}", other),
        };
        artifact
            .files
            .insert("../outside.bin.zst".to_string(), vec![0]);
        assert!(matches!(
            artifact.persist(&dir),
            Err(TambakError::Packaging { .. })
        ));
        assert!(!root.path().join("outside.bin.zst").exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_open_dir_rejects_escaping_file_names() {
        let packer = ArtifactPacker::new(ArtifactFormat::ColumnarSplit, 3, None);
        let artifact = match packer
            .pack(vec![encoded("units", Layout::Columnar)], BTreeMap::new())
            .unwrap()
        {
            Artifact::Split(split) => split,
            other => panic!("Expected split artifact, got {:?}", other),
        };

        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("artifact");
        artifact.persist(&dir).unwrap();
        // A blob placed next to the directory, and a schema pointing at it.
        fs::write(
            root.path().join("outside.bin.zst"),
            fs::read(dir.join("units__a_bin.bin.zst")).unwrap(),
        )
        .unwrap();
        let mut schema = artifact.schema.clone();
        schema
            .files
            .insert("units__a_bin".to_string(), "../outside.bin.zst".to_string());
        fs::write(dir.join(SCHEMA_FILE_NAME), schema.to_json_pretty().unwrap()).unwrap();

        assert!(matches!(
            SplitArtifact::open_dir(&dir),
            Err(TambakError::EnvelopeFormat(_))
        ));
    }

    #[test]
    fn test_split_rejects_foreign_layout() {
        let packer = ArtifactPacker::new(ArtifactFormat::RowMajorSplit, 3, None);
        assert!(packer.accepts(Layout::RowMajor));
        assert!(!packer.accepts(Layout::Columnar));
        assert!(matches!(
            packer.compress_stream(encoded("s", Layout::Columnar)),
            Err(TambakError::Packaging { .. })
        ));
    }
}
