//! Configuration validation
//!
//! This module provides validation logic to ensure configuration values are
//! consistent and don't conflict with each other.

use crate::{ConfigError, ConfigResult, PipelineConfig, HEMISPHERE_PLACEHOLDER};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    MissingPlaceholder { field: String },
    DuplicateHemisphere { hemisphere: String },
    FileNameConflict { field1: String, field2: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::MissingPlaceholder { field } => {
                write!(
                    f,
                    "{} must contain {} when it is shared between hemispheres",
                    field, HEMISPHERE_PLACEHOLDER
                )
            }
            Self::DuplicateHemisphere { hemisphere } => {
                write!(f, "Hemisphere {} listed more than once", hemisphere)
            }
            Self::FileNameConflict { field1, field2 } => {
                write!(f, "{} and {} resolve to the same file", field1, field2)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Required fields
/// - Layout templates that would make both hemispheres share one artifact
/// - File name conflicts inside a unit directory
/// - Hemisphere list sanity
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` with details if validation fails
pub fn validate_config(config: &PipelineConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_required_fields(config, &mut errors);
    validate_layout(config, &mut errors);
    validate_hemispheres(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_required_fields(config: &PipelineConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.pipeline.data_dir.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "pipeline.data_dir".to_string(),
        });
    }

    let layout = &config.layout;
    let names = [
        ("layout.unit_dir", layout.unit_dir.as_str()),
        ("layout.dump_file", layout.dump_file.as_str()),
        ("layout.matrix_file", layout.matrix_file.as_str()),
        ("layout.fingerprint_file", layout.fingerprint_file.as_str()),
    ];
    for (field, value) in names {
        if value.trim().is_empty() {
            errors.push(ConfigValidationError::MissingRequired {
                field: field.to_string(),
            });
        }
    }
    if layout.mask_file.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "layout.mask_file".to_string(),
        });
    }
    if layout.label_file.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "layout.label_file".to_string(),
        });
    }
}

/// Both hemispheres write into `unit_dir`; if it carries no placeholder the
/// per-hemisphere artifacts must.
fn validate_layout(config: &PipelineConfig, errors: &mut Vec<ConfigValidationError>) {
    let layout = &config.layout;
    if config.pipeline.hemispheres.len() > 1 && !layout.unit_dir.contains(HEMISPHERE_PLACEHOLDER) {
        for (field, value) in [
            ("layout.matrix_file", &layout.matrix_file),
            ("layout.fingerprint_file", &layout.fingerprint_file),
            ("layout.dump_file", &layout.dump_file),
        ] {
            if !value.contains(HEMISPHERE_PLACEHOLDER) {
                errors.push(ConfigValidationError::MissingPlaceholder {
                    field: field.to_string(),
                });
            }
        }
    }

    let files = [
        ("layout.dump_file", &layout.dump_file),
        ("layout.matrix_file", &layout.matrix_file),
        ("layout.fingerprint_file", &layout.fingerprint_file),
        ("layout.matrix_npz_file", &layout.matrix_npz_file),
        ("layout.fingerprint_npz_file", &layout.fingerprint_npz_file),
    ];
    for (i, (field1, name1)) in files.iter().enumerate() {
        for (field2, name2) in files.iter().skip(i + 1) {
            if !name1.is_empty() && name1 == name2 {
                errors.push(ConfigValidationError::FileNameConflict {
                    field1: field1.to_string(),
                    field2: field2.to_string(),
                });
            }
        }
    }

    if config.storage.export_npz {
        for (field, name) in [
            ("layout.matrix_npz_file", &layout.matrix_npz_file),
            ("layout.fingerprint_npz_file", &layout.fingerprint_npz_file),
        ] {
            if name.trim().is_empty() {
                errors.push(ConfigValidationError::InvalidValue {
                    field: field.to_string(),
                    reason: "required when storage.export_npz is enabled".to_string(),
                });
            }
        }
    }
}

fn validate_hemispheres(config: &PipelineConfig, errors: &mut Vec<ConfigValidationError>) {
    let hemispheres = &config.pipeline.hemispheres;
    if hemispheres.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "pipeline.hemispheres".to_string(),
        });
    }
    for (i, hemisphere) in hemispheres.iter().enumerate() {
        if hemispheres[..i].contains(hemisphere) {
            errors.push(ConfigValidationError::DuplicateHemisphere {
                hemisphere: hemisphere.to_string(),
            });
        }
    }
}
