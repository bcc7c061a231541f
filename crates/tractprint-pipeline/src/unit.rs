// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-unit processing
//!
//! A unit is one (subject, hemisphere) pair. [`run_unit`] walks a unit through
//! compression, projection and fingerprinting, records every state it passes
//! through, and turns any error into a terminal state instead of returning it.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use tractprint_config::{LayoutConfig, PipelineConfig};
use tractprint_sparse::{compress_dump, CompressOptions, CompressOutcome, SparseError, StorageOptions};
use tractprint_volume::VolumeError;

use crate::fingerprint::{load_projection, write_fingerprint, FingerprintOptions, FingerprintOutcome};
use crate::{PipelineError, PipelineResult};

pub use tractprint_config::Hemisphere;

/// One subject/hemisphere pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Unit {
    pub subject: String,
    pub subject_dir: PathBuf,
    pub hemisphere: Hemisphere,
}

impl Unit {
    pub fn new(subject: impl Into<String>, subject_dir: impl Into<PathBuf>, hemisphere: Hemisphere) -> Self {
        Self {
            subject: subject.into(),
            subject_dir: subject_dir.into(),
            hemisphere,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject, self.hemisphere.code())
    }
}

/// Every file a unit reads or writes, resolved up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPaths {
    pub unit_dir: PathBuf,
    pub dump: PathBuf,
    pub matrix: PathBuf,
    pub fingerprint: PathBuf,
    /// `None` when the layout has no npz file name
    pub matrix_npz: Option<PathBuf>,
    pub fingerprint_npz: Option<PathBuf>,
    pub mask: PathBuf,
    pub labels: PathBuf,
}

impl UnitPaths {
    pub fn resolve(unit: &Unit, layout: &LayoutConfig) -> Self {
        let hemi = unit.hemisphere;
        let unit_dir = unit.subject_dir.join(hemi.expand(&layout.unit_dir));
        let in_unit = |name: &str| unit_dir.join(hemi.expand(name));
        let in_subject = |path: &Path| unit.subject_dir.join(hemi.expand(&path.to_string_lossy()));

        let optional = |name: &str| (!name.is_empty()).then(|| in_unit(name));

        Self {
            dump: in_unit(&layout.dump_file),
            matrix: in_unit(&layout.matrix_file),
            fingerprint: in_unit(&layout.fingerprint_file),
            matrix_npz: optional(&layout.matrix_npz_file),
            fingerprint_npz: optional(&layout.fingerprint_npz_file),
            mask: in_subject(&layout.mask_file),
            labels: in_subject(&layout.label_file),
            unit_dir,
        }
    }
}

/// Where a unit is in its processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    Pending,
    DumpFound,
    Compressed,
    /// Connectivity artifact existed before this run
    AlreadyCompressed,
    ProjectionReady,
    FingerprintReady,
    /// Fingerprint artifact existed before this run
    AlreadyDone,
    MissingInput,
    ParseFailed,
    NormalizationFailed,
    /// Any other I/O, format or shape error
    Failed,
    /// Skipped because the batch was cancelled before the unit started
    Cancelled,
}

impl UnitState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitState::FingerprintReady
                | UnitState::AlreadyDone
                | UnitState::MissingInput
                | UnitState::ParseFailed
                | UnitState::NormalizationFailed
                | UnitState::Failed
                | UnitState::Cancelled
        )
    }

    /// Terminal state with a fingerprint artifact on disk
    pub fn is_success(&self) -> bool {
        matches!(self, UnitState::FingerprintReady | UnitState::AlreadyDone)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UnitState::MissingInput | UnitState::ParseFailed | UnitState::NormalizationFailed | UnitState::Failed
        )
    }

    /// Terminal state for an error raised while processing a unit
    pub fn from_error(error: &PipelineError) -> Self {
        match error {
            PipelineError::Sparse(SparseError::Parse { .. }) => UnitState::ParseFailed,
            PipelineError::Sparse(SparseError::FileAccess { source, .. }) if source.kind() == ErrorKind::NotFound => {
                UnitState::MissingInput
            }
            PipelineError::Volume(VolumeError::FileAccess { path, .. }) if !path.exists() => UnitState::MissingInput,
            PipelineError::InvalidNormalization { .. } => UnitState::NormalizationFailed,
            _ => UnitState::Failed,
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What happened to one unit
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub unit: Unit,
    /// Final state
    pub state: UnitState,
    /// Every state visited, starting with `Pending`
    pub history: Vec<UnitState>,
    /// Error message for failure states
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl UnitOutcome {
    pub fn cancelled(unit: Unit) -> Self {
        Self {
            unit,
            state: UnitState::Cancelled,
            history: vec![UnitState::Pending, UnitState::Cancelled],
            error: None,
            elapsed: Duration::ZERO,
        }
    }

    /// A unit whose processing panicked
    pub fn panicked(unit: Unit, message: &str, elapsed: Duration) -> Self {
        Self {
            unit,
            state: UnitState::Failed,
            history: vec![UnitState::Pending, UnitState::Failed],
            error: Some(format!("panicked: {}", message)),
            elapsed,
        }
    }
}

struct Tracker<'a> {
    unit: &'a Unit,
    history: Vec<UnitState>,
}

impl<'a> Tracker<'a> {
    fn new(unit: &'a Unit) -> Self {
        Self {
            unit,
            history: vec![UnitState::Pending],
        }
    }

    fn advance(&mut self, state: UnitState) {
        info!(target: "tractprint-pipeline", "[{}] {}", self.unit, state);
        self.history.push(state);
    }

    fn current(&self) -> UnitState {
        self.history.last().copied().unwrap_or(UnitState::Pending)
    }
}

fn drive(unit: &Unit, config: &PipelineConfig, tracker: &mut Tracker<'_>) -> PipelineResult<()> {
    let paths = UnitPaths::resolve(unit, &config.layout);
    let recreate = config.pipeline.recreate;
    let storage = StorageOptions {
        compression: config.storage.compression,
    };

    if paths.dump.exists() {
        tracker.advance(UnitState::DumpFound);
    }

    let compress_options = CompressOptions {
        recreate,
        shape: None,
        storage,
        export_npz: paths.matrix_npz.clone().filter(|_| config.storage.export_npz),
    };
    match compress_dump(&paths.dump, &paths.matrix, &compress_options)? {
        CompressOutcome::Compressed { .. } => tracker.advance(UnitState::Compressed),
        CompressOutcome::AlreadyCompressed => tracker.advance(UnitState::AlreadyCompressed),
        CompressOutcome::MissingInput => {
            if paths.fingerprint.exists() && !recreate {
                tracker.advance(UnitState::AlreadyDone);
            } else {
                warn!(
                    target: "tractprint-pipeline",
                    "[{}] Neither {} nor {} exists",
                    unit,
                    paths.dump.display(),
                    paths.matrix.display()
                );
                tracker.advance(UnitState::MissingInput);
            }
            return Ok(());
        }
    }

    if paths.fingerprint.exists() && !recreate {
        tracker.advance(UnitState::AlreadyDone);
        return Ok(());
    }

    let projection = load_projection(&paths)?;
    if projection.reconciled {
        warn!(
            target: "tractprint-pipeline",
            "[{}] Label volume reshaped to the mask grid",
            unit
        );
    }
    tracker.advance(UnitState::ProjectionReady);

    let options = FingerprintOptions::from(config);
    match write_fingerprint(&paths, &projection, &options)? {
        FingerprintOutcome::Written { .. } => tracker.advance(UnitState::FingerprintReady),
        FingerprintOutcome::AlreadyDone => tracker.advance(UnitState::AlreadyDone),
    }
    Ok(())
}

/// Process one unit to a terminal state
///
/// Never returns an error: failures are logged with the unit's subject and
/// hemisphere and reported through [`UnitOutcome::state`] and
/// [`UnitOutcome::error`].
pub fn run_unit(unit: &Unit, config: &PipelineConfig) -> UnitOutcome {
    let start = Instant::now();
    let mut tracker = Tracker::new(unit);

    let error = match drive(unit, config, &mut tracker) {
        Ok(()) => None,
        Err(e) => {
            let state = UnitState::from_error(&e);
            error!(
                target: "tractprint-pipeline",
                "[{}] {} after {}: {}",
                unit,
                state,
                tracker.current(),
                e
            );
            tracker.history.push(state);
            Some(e.to_string())
        }
    };

    UnitOutcome {
        unit: unit.clone(),
        state: tracker.current(),
        history: tracker.history,
        error,
        elapsed: start.elapsed(),
    }
}
