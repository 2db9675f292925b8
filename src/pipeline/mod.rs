//! The export pipeline: startup validation, parallel per-stream encoding with
//! cooperative cancellation and progress reporting, and packaging.

pub mod engine;
pub mod parallelism;
pub mod progress;


pub use engine::{EncodeOutcome, ExportEngine, ExportReport, StreamJob};
pub use parallelism::Parallelism;
pub use progress::ProgressReporter;
