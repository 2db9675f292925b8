//! This module contains the pure, stateless kernels for Zstandard compression and
//! decompression.
//!
//! Compression is the final stage of packaging: it always runs over a complete,
//! fully assembled byte sequence (a whole bundled envelope, or a whole stream or
//! column blob in split mode), never incrementally per value. The output is a
//! plain zstd frame so any standard decoder can read it. This module is a
//! panic-free wrapper around the `zstd` crate.

use std::io::Write;
use zstd::stream::{Decoder, Encoder};

use crate::error::TambakError;

//==================================================================================
// 1. Core Logic
//==================================================================================

/// Compresses `input_bytes` into a single zstd frame at `level`.
pub fn compress(input_bytes: &[u8], level: i32) -> Result<Vec<u8>, TambakError> {
    let mut output_buf = Vec::with_capacity(input_bytes.len() / 2 + 64);

    // The streaming Encoder writes directly to the output buffer.
    let mut encoder = Encoder::new(&mut output_buf, level)
        .map_err(|e| TambakError::ZstdError(e.to_string()))?;
    encoder
        .write_all(input_bytes)
        .map_err(|e| TambakError::ZstdError(e.to_string()))?;

    // `finish` is essential to finalize the Zstd frame.
    encoder
        .finish()
        .map_err(|e| TambakError::ZstdError(e.to_string()))?;
    Ok(output_buf)
}

/// Decompresses a complete zstd frame.
pub fn decompress(input_bytes: &[u8]) -> Result<Vec<u8>, TambakError> {
    let mut decoder =
        Decoder::new(input_bytes).map_err(|e| TambakError::ZstdError(e.to_string()))?;

    // The buffer grows as needed; no size header is trusted.
    let mut output_buf = Vec::new();
    std::io::copy(&mut decoder, &mut output_buf)
        .map_err(|e| TambakError::ZstdError(e.to_string()))?;
    Ok(output_buf)
}

//==================================================================================
// 2. Unit Tests
//==================================================================================
