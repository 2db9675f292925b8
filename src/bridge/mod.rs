// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` connects Arrow data to the Arrow-agnostic export engine. Nothing
// below this layer (`transform`, `codec`, `schema`, `artifact`, `pipeline`) knows
// that Arrow exists.
//
// Data Flow (Export):
//
//   1. [Stateless API (export_record_batches)] -> Receives named `RecordBatch`es
//         |
//         `-> a. Calls `arrow_impl` to convert each `RecordBatch` -> `dataset::Dataset`
//         |
//         `-> b. Runs a one-shot `pipeline::ExportEngine` over the datasets
//
//   2. [Export Engine] -> Returns an `ExportReport` holding the packaged artifact
//
//
// Data Flow (Inspection):
//
//   1. [Stateless API (decode_bundled_stream)] -> Receives a bundled artifact
//         |
//         `-> a. Opens the bundle and decodes one stream with `codec::decode`
//         |
//         `-> b. Calls `arrow_impl` to build a `RecordBatch` of stored values
//
// ====================================================================================
pub mod arrow_impl;
pub mod stateless_api;

pub use arrow_impl::{dataset_from_record_batch, dataset_to_record_batch};
pub use stateless_api::{analyze_bundle, decode_bundled_stream, export_record_batches, BundleStats};
