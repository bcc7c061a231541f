// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Batch execution over many units on a bounded rayon pool

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{error, info, warn};
use tractprint_config::PipelineConfig;

use crate::unit::{run_unit, Unit, UnitOutcome, UnitPaths};
use crate::{PipelineError, PipelineResult};

/// Every subject directory under `data_dir`, sorted by name, crossed with the
/// configured hemispheres
pub fn discover_units(config: &PipelineConfig) -> PipelineResult<Vec<Unit>> {
    let data_dir = &config.pipeline.data_dir;
    let mut subjects = Vec::new();
    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            subjects.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
    }
    subjects.sort();

    let units: Vec<Unit> = subjects
        .into_iter()
        .flat_map(|(subject, dir)| {
            config
                .pipeline
                .hemispheres
                .iter()
                .map(move |&hemisphere| Unit::new(subject.clone(), dir.clone(), hemisphere))
        })
        .collect();

    info!(
        target: "tractprint-pipeline",
        "Discovered {} units under {}",
        units.len(),
        data_dir.display()
    );
    Ok(units)
}

/// Units whose fingerprint artifact does not exist yet
pub fn outstanding_units(config: &PipelineConfig) -> PipelineResult<Vec<Unit>> {
    Ok(discover_units(config)?
        .into_iter()
        .filter(|unit| !UnitPaths::resolve(unit, &config.layout).fingerprint.exists())
        .collect())
}

/// Cooperative cancellation shared between the caller and the workers
///
/// Checked before each unit starts; a unit already running finishes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-unit results of a batch, in input order within each list
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Units that ended with a fingerprint on disk
    pub completed: Vec<UnitOutcome>,
    pub failed: Vec<UnitOutcome>,
    pub cancelled: Vec<Unit>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len() + self.cancelled.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    fn push(&mut self, outcome: UnitOutcome) {
        if outcome.state.is_success() {
            self.completed.push(outcome);
        } else if outcome.state.is_failure() {
            self.failed.push(outcome);
        } else {
            self.cancelled.push(outcome.unit);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Run `work` for `unit`, reporting a panic as a `Failed` outcome
fn run_isolated<F>(unit: &Unit, work: F) -> UnitOutcome
where
    F: FnOnce() -> UnitOutcome,
{
    let start = Instant::now();
    panic::catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        error!(target: "tractprint-pipeline", "[{}] Panicked: {}", unit, message);
        UnitOutcome::panicked(unit.clone(), &message, start.elapsed())
    })
}

/// Runs units in parallel with at most `workers` at a time
pub struct BatchRunner {
    config: PipelineConfig,
    pool: ThreadPool,
}

impl BatchRunner {
    /// Build the worker pool; `workers = 0` uses one thread per core
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.pipeline.workers)
            .thread_name(|i| format!("tractprint-worker-{}", i))
            .build()
            .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;
        Ok(Self { config, pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every unit; a failing unit never stops the others
    pub fn run(&self, units: &[Unit], token: &CancellationToken) -> BatchReport {
        let start = Instant::now();
        info!(
            target: "tractprint-pipeline",
            "Running {} units on {} workers",
            units.len(),
            self.workers()
        );

        let outcomes: Vec<UnitOutcome> = self.pool.install(|| {
            units
                .par_iter()
                .map(|unit| {
                    if token.is_cancelled() {
                        UnitOutcome::cancelled(unit.clone())
                    } else {
                        run_isolated(unit, || run_unit(unit, &self.config))
                    }
                })
                .collect()
        });

        let mut report = BatchReport::default();
        for outcome in outcomes {
            report.push(outcome);
        }

        if !report.cancelled.is_empty() {
            warn!(
                target: "tractprint-pipeline",
                "Batch cancelled: {} units not started",
                report.cancelled.len()
            );
        }
        info!(
            target: "tractprint-pipeline",
            "Batch finished in {:.1}s: {} completed, {} failed, {} cancelled",
            start.elapsed().as_secs_f64(),
            report.completed.len(),
            report.failed.len(),
            report.cancelled.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitState;
    use tractprint_config::Hemisphere;

    fn config_for(data_dir: &std::path::Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.pipeline.data_dir = data_dir.to_path_buf();
        config.pipeline.workers = 2;
        config
    }

    #[test]
    fn test_discover_sorted_subjects_times_hemispheres() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub-02")).unwrap();
        fs::create_dir(dir.path().join("sub-01")).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a subject").unwrap();

        let units = discover_units(&config_for(dir.path())).unwrap();
        let labels: Vec<String> = units.iter().map(|u| u.to_string()).collect();
        assert_eq!(labels, vec!["sub-01/R", "sub-01/L", "sub-02/R", "sub-02/L"]);
    }

    #[test]
    fn test_discover_missing_data_dir() {
        let config = config_for(std::path::Path::new("/nonexistent/tractprint-data"));
        assert!(matches!(discover_units(&config), Err(PipelineError::Io(_))));
    }

    #[test]
    fn test_cancelled_batch_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = BatchRunner::new(config_for(dir.path())).unwrap();
        let units = vec![
            Unit::new("a", dir.path().join("a"), Hemisphere::Right),
            Unit::new("b", dir.path().join("b"), Hemisphere::Left),
        ];

        let token = CancellationToken::new();
        token.cancel();
        let report = runner.run(&units, &token);
        assert_eq!(report.cancelled, units);
        assert_eq!(report.total(), 2);
        assert!(!report.has_failures());
    }

    #[test]
    fn test_failures_do_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let runner = BatchRunner::new(config_for(dir.path())).unwrap();
        let units: Vec<Unit> = (0..4)
            .map(|i| Unit::new(format!("sub-{}", i), dir.path().join(format!("sub-{}", i)), Hemisphere::Right))
            .collect();

        let report = runner.run(&units, &CancellationToken::new());
        assert_eq!(report.failed.len(), 4);
        let order: Vec<&Unit> = report.failed.iter().map(|o| &o.unit).collect();
        assert_eq!(order, units.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_unit_is_failed() {
        let unit = Unit::new("sub-01", "/data/sub-01", Hemisphere::Left);
        let outcome = run_isolated(&unit, || panic!("corrupt volume header"));
        assert_eq!(outcome.state, UnitState::Failed);
        assert_eq!(outcome.history, vec![UnitState::Pending, UnitState::Failed]);
        assert!(outcome.error.unwrap().contains("corrupt volume header"));

        let ok = run_isolated(&unit, || UnitOutcome::cancelled(unit.clone()));
        assert_eq!(ok.state, UnitState::Cancelled);
    }

    #[test]
    fn test_outstanding_units() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub-01")).unwrap();
        let config = config_for(dir.path());

        let done = UnitPaths::resolve(&Unit::new("sub-01", dir.path().join("sub-01"), Hemisphere::Right), &config.layout);
        fs::create_dir_all(&done.unit_dir).unwrap();
        fs::write(&done.fingerprint, b"x").unwrap();

        let outstanding = outstanding_units(&config).unwrap();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].hemisphere, Hemisphere::Left);
    }
}
