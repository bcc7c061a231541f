// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Fingerprint Batch Tool

Compresses every tractography dump under a data directory and writes the
normalized bundle fingerprint for each subject/hemisphere.

Usage:
  cargo run --release --bin fingerprint_batch -- [options]

Run with `--help` for the full option list, including the per-crate
`--debug-<crate>` / `--trace-<crate>` log flags.

Ctrl-C stops new units from starting; units already running finish.

Example:
  cargo run --release --bin fingerprint_batch -- --data-dir /data/HCP --workers 8

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tractprint::config::{apply_cli_overrides, apply_environment_overrides, find_config_file, load_config};
use tractprint::observability::{
    debug_flags_help, init_logging, is_level_flag, parse_debug_flags, LoggingOptions, BATCH_TARGET,
};
use tractprint::pipeline::{outstanding_units, CancellationToken};
use tractprint::prelude::PipelineConfig;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "fingerprint_batch", version, about, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// TOML configuration (default: tractprint.toml, searched upward)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with one sub-directory per subject
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Worker threads (0 = one per core)
    #[arg(long)]
    workers: Option<usize>,

    /// Comma-separated hemispheres, e.g. "R,L"
    #[arg(long)]
    hemispheres: Option<String>,

    /// Console log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Write JSON logs to timestamped run folders here
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Rebuild artifacts even if they exist
    #[arg(long, default_value_t = false)]
    recreate: bool,

    /// Skip the scipy .npz copies of both artifacts
    #[arg(long, default_value_t = false)]
    no_npz: bool,

    /// Only list units still missing a fingerprint
    #[arg(long, default_value_t = false)]
    outstanding: bool,
}

impl Args {
    /// Overrides in the key form `apply_cli_overrides` reads
    fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                overrides.insert(key.to_string(), value);
            }
        };
        set("data_dir", self.data_dir.as_ref().map(|p| p.display().to_string()));
        set("workers", self.workers.map(|n| n.to_string()));
        set("hemispheres", self.hemispheres.clone());
        set("log_level", self.log_level.clone());
        set("log_dir", self.log_dir.as_ref().map(|p| p.display().to_string()));
        set("recreate", self.recreate.then(|| "true".to_string()));
        set("export_npz", self.no_npz.then(|| "false".to_string()));
        overrides
    }
}

/// Config file if one is given or found; built-in defaults otherwise
fn resolve_config(args: &Args) -> Result<PipelineConfig> {
    let overrides = args.overrides();
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => find_config_file().ok(),
    };

    if let Some(path) = path {
        return load_config(Some(path.as_path()), Some(&overrides))
            .with_context(|| format!("Failed to load {}", path.display()));
    }

    let mut config = PipelineConfig::default();
    apply_environment_overrides(&mut config);
    apply_cli_overrides(&mut config, &overrides)?;
    Ok(config)
}

fn main() -> Result<()> {
    // --debug-<crate> / --trace-<crate> are read by parse_debug_flags
    let args = Args::parse_from(env::args().filter(|arg| !is_level_flag(arg)));
    let config = resolve_config(&args)?;

    let logging = LoggingOptions {
        default_level: config.logging.level.clone(),
        log_dir: config.logging.log_dir.clone(),
        retention_days: config.logging.retention_days,
        retention_runs: config.logging.retention_runs,
    };
    let debug_flags = parse_debug_flags();
    let _guard = init_logging(&debug_flags, &logging)?;
    for name in &debug_flags.unknown {
        warn!(target: BATCH_TARGET, "Ignoring debug flag for unknown crate '{}'", name);
    }

    println!("🧠 tractprint fingerprint batch");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📂 Data dir:  {}", config.pipeline.data_dir.display());
    println!("🔁 Recreate:  {}", config.pipeline.recreate);
    println!();

    if args.outstanding {
        let units = outstanding_units(&config)?;
        println!("📋 {} units without a fingerprint:", units.len());
        for unit in &units {
            println!("   {}", unit);
        }
        return Ok(());
    }

    let token = CancellationToken::new();
    tractprint::cancel_on_interrupt(&token)?;

    let report = tractprint::run_batch(config, &token)?;

    println!();
    println!("✅ Completed: {}", report.completed.len());
    println!("❌ Failed:    {}", report.failed.len());
    for outcome in &report.failed {
        println!(
            "   {} [{}] {}",
            outcome.unit,
            outcome.state,
            outcome.error.as_deref().unwrap_or("")
        );
    }
    if !report.cancelled.is_empty() {
        println!("⏹  Cancelled: {}", report.cancelled.len());
    }

    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::parse_from(std::iter::once("fingerprint_batch").chain(args.iter().copied()))
    }

    #[test]
    fn test_flags_map_to_overrides() {
        let args = parse(&["--data-dir", "/data/HCP", "--workers", "8", "--hemispheres", "L", "--recreate", "--no-npz"]);
        let overrides = args.overrides();
        assert_eq!(overrides["data_dir"], "/data/HCP");
        assert_eq!(overrides["workers"], "8");
        assert_eq!(overrides["hemispheres"], "L");
        assert_eq!(overrides["recreate"], "true");
        assert_eq!(overrides["export_npz"], "false");
        assert!(!overrides.contains_key("log_dir"));
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let overrides = parse(&[]).overrides();
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_bad_worker_count_rejected() {
        let result = Args::try_parse_from(["fingerprint_batch", "--workers", "many"]);
        assert!(result.is_err());
    }
}
