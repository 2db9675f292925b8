//! This file is the root of the `tambak_export` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`pipeline`, `codec`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the handful of types most callers need to run an export.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod artifact;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod contract;
pub mod dataset;
pub mod error;
pub mod kernels;
pub mod pipeline;
pub mod schema;
pub mod traits;
pub mod transform;
pub mod types;

//==================================================================================
// 2. Public Re-exports
//==================================================================================
pub use artifact::{Artifact, ArtifactPacker, BundledArtifact, OpenedArtifact, SplitArtifact};
pub use config::{ArtifactFormat, ExportConfig, OverflowPolicy, StreamErrorPolicy};
pub use contract::{ColumnRule, ContractRegistry, Layout, OutputContract, ScaleSpec};
pub use dataset::{Column, ColumnValues, Dataset, NamedDataset};
pub use error::TambakError;
pub use observability::init_logging;
pub use pipeline::{ExportEngine, ExportReport};
pub use schema::{ArtifactSchema, ColumnDescriptor, StreamDescriptor};
pub use types::TambakDataType;
