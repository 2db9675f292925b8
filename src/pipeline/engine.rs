// In: src/pipeline/engine.rs

//! The `ExportEngine`: the top-level coordinator of one export.
//!
//! The lifecycle of a call is strictly ordered:
//! 1. `prepare`: resolve a contract for every dataset and validate it against the
//!    dataset. Any configuration error stops the export before a byte is encoded.
//! 2. `encode_all`: transform and encode every stream in parallel. Each stream
//!    owns its buffers; nothing is shared between workers except the cancellation
//!    flag and the progress counter.
//! 3. packaging: bundled mode waits for every stream (the envelope is compressed
//!    once), split mode compresses each stream's blobs inside its worker.
//!
//! The engine holds no state between calls.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::artifact::format::check_name_part;
use crate::artifact::{Artifact, ArtifactPacker};
use crate::codec::{codec_for, EncodedStream};
use crate::config::{ArtifactFormat, ExportConfig, StreamErrorPolicy};
use crate::contract::{ContractRegistry, OutputContract};
use crate::dataset::{Dataset, NamedDataset};
use crate::error::TambakError;
use crate::pipeline::parallelism::Parallelism;
use crate::pipeline::progress::ProgressReporter;
use crate::transform::apply_contract;

//==================================================================================
// 1. Public Types
//==================================================================================

/// One stream ready to encode: its dataset and its resolved, validated contract.
#[derive(Debug, Clone)]
pub struct StreamJob<'a> {
    pub name: &'a str,
    pub dataset: &'a Dataset,
    pub contract: Cow<'a, OutputContract>,
}

/// The result of encoding a batch of streams.
#[derive(Debug)]
pub struct EncodeOutcome<T> {
    /// Successful streams, in input order.
    pub streams: Vec<T>,
    /// Streams that failed under `StreamErrorPolicy::Skip`, tagged with their name.
    pub failures: Vec<TambakError>,
}

/// The result of a complete export.
#[derive(Debug)]
pub struct ExportReport {
    pub artifact: Artifact,
    /// Streams left out under `StreamErrorPolicy::Skip`.
    pub failures: Vec<TambakError>,
    pub rows_encoded: u64,
}

#[derive(Debug, Clone)]
pub struct ExportEngine {
    config: Arc<ExportConfig>,
    contracts: Arc<ContractRegistry>,
}

//==================================================================================
// 2. Engine
//==================================================================================

impl ExportEngine {
    /// Creates an engine, validating both configuration objects up front.
    pub fn new(
        config: Arc<ExportConfig>,
        contracts: Arc<ContractRegistry>,
    ) -> Result<Self, TambakError> {
        config.validate()?;
        contracts.validate()?;
        Ok(Self { config, contracts })
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn contracts(&self) -> &ContractRegistry {
        &self.contracts
    }

    fn packer(&self) -> ArtifactPacker {
        ArtifactPacker::from_config(&self.config)
    }

    /// Resolves and validates the contract of every dataset.
    ///
    /// Fails with `ContractConfig` on the first invalid contract, duplicate
    /// dataset name, or stream or column name that cannot form a data key. Empty datasets and datasets whose layout does not belong in
    /// the configured split format are left out with a log line.
    pub fn prepare<'a>(
        &'a self,
        datasets: &'a [NamedDataset],
    ) -> Result<Vec<StreamJob<'a>>, TambakError> {
        let packer = self.packer();
        let mut seen = BTreeSet::new();
        let mut jobs = Vec::with_capacity(datasets.len());

        for named in datasets {
            if !seen.insert(named.name.as_str()) {
                return Err(TambakError::ContractConfig(format!(
                    "Dataset '{}' is supplied more than once",
                    named.name
                )));
            }

            check_name_part("stream", &named.name)?;
            for column in named.dataset.columns() {
                check_name_part("column", column.name())?;
            }

            let contract = self.contracts.resolve(&named.name);
            contract.validate_against(&named.name, &named.dataset)?;

            let dataset = &named.dataset;
            if dataset.num_columns() == 0 || dataset.columns().iter().all(|c| c.is_empty()) {
                log::info!("Skipping empty dataset '{}'.", named.name);
                continue;
            }
            if !packer.accepts(contract.layout) {
                log::warn!(
                    "Skipping '{}': {:?} streams are not part of a {:?} artifact.",
                    named.name,
                    contract.layout,
                    packer.format()
                );
                continue;
            }

            jobs.push(StreamJob {
                name: &named.name,
                dataset,
                contract,
            });
        }
        Ok(jobs)
    }

    /// Transforms and encodes a single stream. Errors carry the stream name.
    pub fn encode_stream(
        &self,
        job: &StreamJob<'_>,
        progress: &ProgressReporter<'_>,
    ) -> Result<EncodedStream, TambakError> {
        let encode = || -> Result<EncodedStream, TambakError> {
            // Resolved scales are fixed here for the rest of this stream's encode.
            let columns = apply_contract(
                job.name,
                job.dataset,
                &job.contract,
                self.config.overflow_policy,
            )?;
            let codec = codec_for(job.contract.layout, self.config.progress_batch_rows);
            codec.encode(job.name, &columns, &mut |rows| progress.advance(rows))
        };

        let encoded = encode().map_err(|e| e.in_stream(job.name))?;
        log::info!(
            "Encoded stream '{}' ({:?}): {} rows, {} bytes.",
            job.name,
            encoded.descriptor.layout,
            encoded.descriptor.num_rows,
            encoded.raw_size()
        );
        log_metric!(
            "event" = "stream_encoded",
            "stream" = job.name,
            "rows" = encoded.descriptor.num_rows,
            "bytes" = encoded.raw_size()
        );
        Ok(encoded)
    }

    /// Encodes every job, then runs `finish` on each result inside the same worker.
    ///
    /// Under `StreamErrorPolicy::Abort` the first failure stops the scheduling of
    /// streams that have not started yet; streams already in flight complete, and
    /// the failure of the earliest stream in input order is returned. Under `Skip`
    /// every stream runs and failures are collected.
    pub fn encode_all<T, F>(
        &self,
        jobs: &[StreamJob<'_>],
        progress: &ProgressReporter<'_>,
        finish: F,
    ) -> Result<EncodeOutcome<T>, TambakError>
    where
        T: Send,
        F: Fn(EncodedStream) -> Result<T, TambakError> + Sync + Send,
    {
        let policy = self.config.on_stream_error;
        let cancelled = AtomicBool::new(false);

        let run = |job: &StreamJob<'_>| -> Option<Result<T, TambakError>> {
            if cancelled.load(Ordering::SeqCst) {
                return None;
            }
            let result = self
                .encode_stream(job, progress)
                .and_then(&finish)
                .map_err(|e| e.in_stream(job.name));
            if result.is_err() && policy == StreamErrorPolicy::Abort {
                cancelled.store(true, Ordering::SeqCst);
            }
            Some(result)
        };

        let parallelism = Parallelism::from_threads(self.config.threads).correct_for_workload(jobs.len());
        let results = parallelism.map(jobs, run)?;

        let mut streams = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        let mut not_started = 0usize;
        for result in results {
            match result {
                Some(Ok(stream)) => streams.push(stream),
                Some(Err(e)) => failures.push(e),
                None => not_started += 1,
            }
        }

        match policy {
            StreamErrorPolicy::Abort => {
                if let Some(first) = failures.into_iter().next() {
                    log::error!(
                        "Export aborted: {} ({} stream(s) never started).",
                        first,
                        not_started
                    );
                    return Err(first);
                }
                Ok(EncodeOutcome {
                    streams,
                    failures: Vec::new(),
                })
            }
            StreamErrorPolicy::Skip => {
                for failure in &failures {
                    log::warn!("Skipping failed stream: {}", failure);
                }
                Ok(EncodeOutcome { streams, failures })
            }
        }
    }

    /// Runs a complete export and packages the artifact in the configured format.
    pub fn export(
        &self,
        datasets: &[NamedDataset],
        progress: Option<&(dyn Fn(u64) + Sync)>,
    ) -> Result<ExportReport, TambakError> {
        self.export_with_assets(datasets, BTreeMap::new(), progress)
    }

    /// Like `export`, additionally storing opaque `static_assets` in a bundle.
    pub fn export_with_assets(
        &self,
        datasets: &[NamedDataset],
        static_assets: BTreeMap<String, Vec<u8>>,
        progress: Option<&(dyn Fn(u64) + Sync)>,
    ) -> Result<ExportReport, TambakError> {
        let jobs = self.prepare(datasets)?;
        let reporter = ProgressReporter::new(progress);
        let packer = self.packer();

        log::info!(
            "Exporting {} stream(s) as {:?}.",
            jobs.len(),
            self.config.format
        );

        let (artifact, failures) = match self.config.format {
            ArtifactFormat::HybridBundle => {
                // Barrier: the envelope needs every stream's bytes at once.
                let outcome = self.encode_all(&jobs, &reporter, Ok)?;
                let bundle = packer.pack_bundled(outcome.streams, static_assets)?;
                (Artifact::Bundled(bundle), outcome.failures)
            }
            ArtifactFormat::RowMajorSplit | ArtifactFormat::ColumnarSplit => {
                if !static_assets.is_empty() {
                    log::warn!(
                        "Ignoring {} static asset(s): only bundled artifacts carry them.",
                        static_assets.len()
                    );
                }
                // No barrier: each worker compresses its own stream right away.
                let outcome =
                    self.encode_all(&jobs, &reporter, |encoded| packer.compress_stream(encoded))?;
                let split = packer.pack_split(outcome.streams)?;
                (Artifact::Split(split), outcome.failures)
            }
        };

        Ok(ExportReport {
            artifact,
            failures,
            rows_encoded: reporter.rows_encoded(),
        })
    }
}
