// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `tractprint.toml`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Placeholder expanded to the hemisphere code (`R` / `L`) in layout templates
pub const HEMISPHERE_PLACEHOLDER: &str = "{hemi}";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pipeline: RunConfig,
    pub layout: LayoutConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Brain hemisphere processed as an independent unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    #[serde(alias = "L", alias = "l")]
    Left,
    #[serde(alias = "R", alias = "r")]
    Right,
}

impl Hemisphere {
    /// Both hemispheres in processing order (right first)
    pub const ALL: [Hemisphere; 2] = [Hemisphere::Right, Hemisphere::Left];

    /// Single-letter code used in file and directory names
    pub fn code(&self) -> &'static str {
        match self {
            Hemisphere::Left => "L",
            Hemisphere::Right => "R",
        }
    }

    /// Lowercase long name
    pub fn name(&self) -> &'static str {
        match self {
            Hemisphere::Left => "left",
            Hemisphere::Right => "right",
        }
    }

    /// Expand every `{hemi}` placeholder in a layout template
    pub fn expand(&self, template: &str) -> String {
        template.replace(HEMISPHERE_PLACEHOLDER, self.code())
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hemisphere {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "left" => Ok(Hemisphere::Left),
            "r" | "right" => Ok(Hemisphere::Right),
            other => Err(format!("unknown hemisphere '{}'", other)),
        }
    }
}

/// Batch run configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding one sub-directory per subject
    pub data_dir: PathBuf,
    /// When true, ignore existing artifacts and rebuild
    pub recreate: bool,
    /// Worker threads for the batch pool (0 = one per core)
    pub workers: usize,
    /// Hemispheres processed for every subject
    pub hemispheres: Vec<Hemisphere>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(""),
            recreate: false,
            workers: 0, // 0 = auto-detect
            hemispheres: Hemisphere::ALL.to_vec(),
        }
    }
}

/// Per-subject file layout
///
/// All paths are relative to the subject directory. `{hemi}` is replaced with
/// the hemisphere code.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Directory holding the tractography output for one hemisphere
    pub unit_dir: String,
    /// Coordinate-list dump written by the tractography tool
    pub dump_file: String,
    /// Compressed connectivity matrix
    pub matrix_file: String,
    /// Normalized fingerprint matrix
    pub fingerprint_file: String,
    /// Scipy-compatible export of the connectivity matrix
    pub matrix_npz_file: String,
    /// Scipy-compatible export of the fingerprint
    pub fingerprint_npz_file: String,
    /// Binary brain mask volume
    pub mask_file: PathBuf,
    /// Multi-channel bundle segmentation volume
    pub label_file: PathBuf,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            unit_dir: "probtrackx_{hemi}_omatrix2".to_string(),
            dump_file: "fdt_matrix2.dot".to_string(),
            matrix_file: "fdt_matrix2.csr".to_string(),
            fingerprint_file: "finger_print_fiber_{hemi}.csr".to_string(),
            matrix_npz_file: "fdt_matrix2.npz".to_string(),
            fingerprint_npz_file: "finger_print_fiber_{hemi}.npz".to_string(),
            mask_file: PathBuf::from("DTI/LowResMask.nii.gz"),
            label_file: PathBuf::from("DTI/LowRes_Fibers.nii.gz"),
        }
    }
}

/// Artifact storage options
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// LZ4-compress artifact payloads
    pub compression: bool,
    /// Also write both artifacts as scipy `.npz` files for Python consumers
    pub export_npz: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            compression: true,
            export_npz: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Base directory for per-run log folders; console only when unset
    pub log_dir: Option<PathBuf>,
    /// Keep run folders for N days
    pub retention_days: u64,
    /// Keep the N most recent run folders
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            retention_days: 30,
            retention_runs: 10,
        }
    }
}
