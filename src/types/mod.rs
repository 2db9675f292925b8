//! This module defines the core, strongly-typed data representations used
//! throughout the export engine.
//!
//! It currently includes the canonical `TambakDataType` enum, the closed set of
//! element types a stream column may have on the wire.

pub mod tambak_data_type;

// Re-export the main type(s) for easier access.
pub use tambak_data_type::TambakDataType;
