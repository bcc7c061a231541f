//! # tractprint - Tractography Connectivity Fingerprints
//!
//! Converts the voxel-to-target connectivity dumps written by probabilistic
//! tractography into compressed sparse matrices, projects them onto a fiber
//! bundle segmentation, and stores a per-voxel, per-bundle fingerprint
//! normalized by bundle size.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! tractprint = "0.1"  # Default: scipy .npz export enabled
//! ```
//!
//! ## Feature Flags
//!
//! - **`npz`** (default): also write the connectivity and fingerprint matrices
//!   as scipy `csr_matrix` archives
//!
//! ## Usage Examples
//!
//! ### Whole data directory
//!
//! ```rust,no_run
//! use tractprint::prelude::*;
//!
//! let mut config = load_config(None, None)?;
//! config.pipeline.data_dir = "/data/hcp".into();
//!
//! let report = tractprint::run_batch(config, &CancellationToken::new())?;
//! for outcome in &report.failed {
//!     eprintln!("{}: {}", outcome.unit, outcome.state);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ### Single steps
//!
//! ```rust,no_run
//! use tractprint::sparse::{compress_dump, load_matrix, CompressOptions};
//! use tractprint::volume::{project, LabelVolume, MaskVolume};
//! use tractprint::pipeline::compute_fingerprint;
//!
//! compress_dump("fdt_matrix2.dot", "fdt_matrix2.csr", &CompressOptions::default())?;
//! let projection = project(
//!     &LabelVolume::load("LowRes_Fibers.nii.gz")?,
//!     &MaskVolume::load("LowResMask.nii.gz")?,
//! )?;
//! let fingerprint = compute_fingerprint(load_matrix("fdt_matrix2.csr")?, &projection)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: tractprint-config, tractprint-observability│
//! │  (TOML configuration, logging)                          │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Data: tractprint-sparse, tractprint-volume             │
//! │  (triplet dumps → CSR artifacts, NIfTI → projection)    │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Processing: tractprint-pipeline                        │
//! │  (fingerprints, per-unit state machine, worker pool)    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

use anyhow::{Context, Result};
use tracing::{info, warn};
use tractprint_observability::BATCH_TARGET;

pub use tractprint_config as config;
pub use tractprint_observability as observability;
pub use tractprint_pipeline as pipeline;
pub use tractprint_sparse as sparse;
pub use tractprint_volume as volume;

/// Prelude - commonly used types and functions
pub mod prelude {
    pub use crate::config::{load_config, validate_config, Hemisphere, PipelineConfig};

    pub use crate::pipeline::{
        discover_units, generate_fingerprint, outstanding_units, run_unit, BatchReport, BatchRunner,
        CancellationToken, FingerprintOptions, Unit, UnitOutcome, UnitPaths, UnitState,
    };

    pub use crate::sparse::{compress_dump, load_matrix, save_matrix, CompressOptions, CompressOutcome, CsMat};

    pub use crate::volume::{project, LabelVolume, MaskVolume, Projection};
}

/// Validate the configuration, discover every unit and run them all
pub fn run_batch(
    config: config::PipelineConfig,
    token: &pipeline::CancellationToken,
) -> Result<pipeline::BatchReport> {
    config::validate_config(&config).context("Invalid pipeline configuration")?;

    let units = pipeline::discover_units(&config)
        .with_context(|| format!("Failed to list subjects in {}", config.pipeline.data_dir.display()))?;
    let runner = pipeline::BatchRunner::new(config).context("Failed to start worker pool")?;

    info!(target: BATCH_TARGET, "tractprint v{}: {} units", env!("CARGO_PKG_VERSION"), units.len());
    Ok(runner.run(&units, token))
}

/// Cancel `token` on Ctrl-C
///
/// Units already running finish; the rest are reported as cancelled. Only
/// one handler can be installed per process.
pub fn cancel_on_interrupt(token: &pipeline::CancellationToken) -> Result<()> {
    let handler_token = token.clone();
    ctrlc::set_handler(move || interrupt(&handler_token)).context("Failed to install Ctrl-C handler")
}

fn interrupt(token: &pipeline::CancellationToken) {
    warn!(target: BATCH_TARGET, "Interrupt received: letting running units finish");
    token.cancel();
}
