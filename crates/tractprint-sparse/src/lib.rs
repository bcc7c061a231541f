// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # tractprint Sparse Matrices
//!
//! Conversion of tractography coordinate-list dumps (`fdt_matrix2.dot`) into
//! compressed sparse row matrices, and the binary artifact format they are
//! stored in.
//!
//! ## Design Goals
//! - **Streaming**: the text dump is parsed line by line, never held in memory as text
//! - **Compact**: optional LZ4 compression of the stored payload
//! - **Safe**: artifacts are written to a temporary file and renamed into place
//! - **Version-safe**: format versioning and checksum on load
//!
//! ## Usage
//! ```ignore
//! use tractprint_sparse::{compress_dump, CompressOptions, load_matrix};
//!
//! let outcome = compress_dump(dump_path, artifact_path, &CompressOptions::default())?;
//! let matrix = load_matrix(artifact_path)?;
//! ```
//!
//! ## Shape
//! The matrix shape is inferred from the largest row and column index in the
//! dump unless an explicit shape is supplied. The shape is stored in the
//! artifact header, and consumers use the stored value.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

use std::path::PathBuf;
use thiserror::Error;

mod builder;
mod format;
#[cfg(feature = "npz")]
mod npz;
mod triplet;

pub use builder::*;
pub use format::*;
#[cfg(feature = "npz")]
pub use npz::*;
pub use triplet::*;

/// Re-export so downstream crates name the same matrix type
pub use sprs::CsMat;

/// Sparse matrix I/O errors
#[derive(Error, Debug)]
pub enum SparseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot access {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Out of memory while reading triplets: could not grow beyond {entries} entries")]
    OutOfMemory { entries: usize },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Index ({row}, {col}) out of range for shape {shape:?}")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        shape: (usize, usize),
    },

    #[error("Artifact {path} may be partially written: {source}")]
    PartialWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: u32,
        expected_version: u32,
    },

    #[error("Invalid magic number: expected TRKSP, got {0:?}")]
    InvalidMagic([u8; 5]),

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Invalid sparse structure: {0}")]
    Structure(String),

    #[error("NPZ export error: {0}")]
    Npz(String),
}

pub type SparseResult<T> = std::result::Result<T, SparseError>;
