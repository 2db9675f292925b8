//! This module contains the compression kernels used when packaging artifacts.
//!
//! Kernels are pure functions over byte slices. They know nothing about streams,
//! schemas or artifact formats.

pub mod zstd;
