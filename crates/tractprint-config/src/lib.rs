// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # tractprint Configuration
//!
//! One `tractprint.toml` describes a whole batch run: where the subjects live,
//! how each subject directory is laid out and how artifacts are stored.
//! Environment variables and command-line values are applied on top, in that
//! order.
//!
//! ```toml
//! [pipeline]
//! data_dir = "/data/HCP"
//! recreate = false
//! workers = 8
//! hemispheres = ["R", "L"]
//!
//! [layout]
//! unit_dir = "probtrackx_{hemi}_omatrix2"
//! mask_file = "DTI/LowResMask.nii.gz"
//!
//! [storage]
//! export_npz = true
//! ```
//!
//! ```rust,no_run
//! use tractprint_config::{load_config, validate_config};
//!
//! let config = load_config(None, None)?;
//! validate_config(&config)?;
//! println!("{} hemispheres per subject", config.pipeline.hemispheres.len());
//! # Ok::<(), tractprint_config::ConfigError>(())
//! ```
//!
//! Units receive their paths from a `PipelineConfig` value; nothing reads the
//! process working directory after loading.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{apply_cli_overrides, apply_environment_overrides, find_config_file, load_config};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No tractprint.toml found (searched {0})")]
    FileNotFound(String),

    #[error("Cannot read configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed TOML: {0}")]
    ParseError(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = PipelineConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["pipeline"]["recreate"], serde_json::json!(false));
        assert_eq!(json["pipeline"]["hemispheres"], serde_json::json!(["right", "left"]));
    }
}
