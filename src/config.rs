// In: src/config.rs

//! The single source of truth for all export configuration.
//!
//! `ExportConfig` is created once at the application boundary (from code or a JSON
//! document) and then passed down through the engine as a shared, read-only
//! `Arc<ExportConfig>`. There is no process-wide mutable configuration.

use serde::{Deserialize, Serialize};

use crate::error::TambakError;

//==================================================================================
// I. Core Configuration Enums
//==================================================================================

/// The packaging mode of the final artifact. These are the format selectors an
/// orchestrator exposes on its command line.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactFormat {
    /// **Default:** a single zstd-compressed envelope holding the schema and every
    /// blob of every stream.
    #[default]
    HybridBundle,

    /// A `schema.json` plus one compressed file per row-major stream. Columnar
    /// streams are left out.
    RowMajorSplit,

    /// A `schema.json` plus one compressed file per column of every columnar
    /// stream. Row-major streams are left out.
    ColumnarSplit,
}

/// Defines the trade-off between compression speed and final artifact size.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompressionProfile {
    /// Prioritizes speed over size.
    Fast,

    /// A balance between speed and size. This is the recommended default.
    #[default]
    Balanced,

    /// Prioritizes the smallest possible artifact at the cost of CPU time.
    HighCompression,
}

impl CompressionProfile {
    /// The zstd level this profile maps to.
    pub fn zstd_level(&self) -> i32 {
        match self {
            CompressionProfile::Fast => 1,
            CompressionProfile::Balanced => 3,
            CompressionProfile::HighCompression => 19,
        }
    }
}

/// What to do with a value that does not fit the target integer range of a
/// quantize or cast rule.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// **Default:** the value aborts the stream with an error naming the column.
    #[default]
    Error,

    /// The value saturates to the nearest bound. Every clamped value is counted,
    /// logged, and recorded in the column descriptor.
    Clamp,
}

/// What the engine does when one stream fails to encode.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorPolicy {
    /// **Default:** stop scheduling further streams and fail the whole export.
    #[default]
    Abort,

    /// Leave the failing stream out of the artifact and keep going. Failures are
    /// reported back to the caller.
    Skip,
}

//==================================================================================
// II. The Unified ExportConfig
//==================================================================================

/// The single, unified configuration for one export run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ExportConfig {
    /// The packaging mode of the artifact.
    #[serde(default)]
    pub format: ArtifactFormat,

    /// The profile selecting the zstd level.
    #[serde(default)]
    pub profile: CompressionProfile,

    /// Explicit zstd level. Overrides `profile` when set.
    #[serde(default)]
    pub zstd_level: Option<i32>,

    /// Range violation handling for quantize and cast rules.
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// Per-stream failure handling.
    #[serde(default)]
    pub on_stream_error: StreamErrorPolicy,

    /// Worker threads for per-stream encoding. `0` uses rayon's global pool,
    /// `1` encodes sequentially on the calling thread.
    #[serde(default)]
    pub threads: usize,

    /// Rows written per batch. The progress callback fires between batches.
    #[serde(default = "default_progress_batch_rows")]
    pub progress_batch_rows: usize,

    /// Identifier recorded in the artifact schema (e.g. a replay id).
    #[serde(default)]
    pub artifact_id: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ArtifactFormat::default(),
            profile: CompressionProfile::default(),
            zstd_level: None,
            overflow_policy: OverflowPolicy::default(),
            on_stream_error: StreamErrorPolicy::default(),
            threads: 0,
            progress_batch_rows: default_progress_batch_rows(),
            artifact_id: None,
        }
    }
}

impl ExportConfig {
    /// Parses and validates a configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, TambakError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TambakError::ContractConfig(format!("Invalid export config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TambakError> {
        if self.progress_batch_rows == 0 {
            return Err(TambakError::ContractConfig(
                "progress_batch_rows must be greater than zero".into(),
            ));
        }
        if let Some(level) = self.zstd_level {
            let range = zstd::compression_level_range();
            if !range.contains(&level) {
                return Err(TambakError::ContractConfig(format!(
                    "zstd_level {} is outside the supported range {:?}",
                    level, range
                )));
            }
        }
        Ok(())
    }

    /// The zstd level actually used for packaging.
    pub fn effective_zstd_level(&self) -> i32 {
        self.zstd_level.unwrap_or_else(|| self.profile.zstd_level())
    }

    pub fn with_format(mut self, format: ArtifactFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn with_stream_error_policy(mut self, policy: StreamErrorPolicy) -> Self {
        self.on_stream_error = policy;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }
}

/// Provides a sensible default for `progress_batch_rows` for serde.
fn default_progress_batch_rows() -> usize {
    65_536
}
