// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # tractprint Pipeline
//!
//! Turns one subject/hemisphere *unit* from a raw tractography dump into a
//! normalized connectivity fingerprint, and runs many units on a bounded
//! worker pool.
//!
//! ## Per-unit flow
//! ```text
//! Pending ──► DumpFound ──► Compressed ──────────► ProjectionReady ──► FingerprintReady
//!    │                          ▲                                          ▲
//!    └──── AlreadyCompressed ───┘                       AlreadyDone ───────┘
//!
//! terminal failures: MissingInput | ParseFailed | NormalizationFailed | Failed
//! ```
//!
//! Failures are caught at the unit boundary and reported in the unit's
//! outcome; a batch never stops because one unit failed. The absence of a
//! unit's fingerprint artifact is the durable signal that it still needs
//! attention.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

use thiserror::Error;
use tractprint_config::ConfigError;
use tractprint_sparse::SparseError;
use tractprint_volume::VolumeError;

pub mod batch;
pub mod fingerprint;
pub mod unit;

pub use batch::{discover_units, outstanding_units, BatchReport, BatchRunner, CancellationToken};
pub use fingerprint::{
    bundle_divisor, compute_fingerprint, generate_fingerprint, normalize_fingerprint, widen_columns,
    FingerprintOptions, FingerprintOutcome,
};
pub use unit::{run_unit, Hemisphere, Unit, UnitOutcome, UnitPaths, UnitState};

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Sparse(#[from] SparseError),

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error("Invalid normalization: bundle {bundle} has size {size}")]
    InvalidNormalization { bundle: usize, size: f64 },

    #[error("Shape mismatch: connectivity is {connectivity:?} but projection is {projection:?}")]
    ShapeMismatch {
        connectivity: (usize, usize),
        projection: (usize, usize),
    },

    #[error("Fingerprint has {columns} bundle columns but {sizes} bundle sizes")]
    BundleCount { columns: usize, sizes: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
