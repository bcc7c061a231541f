// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration loading
//!
//! Precedence, lowest to highest: TOML file, `TRACTPRINT_*` environment
//! variables, command-line values.

use crate::{ConfigError, ConfigResult, Hemisphere, PipelineConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "tractprint.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV_VAR: &str = "TRACTPRINT_CONFIG_PATH";

/// Directories above the working directory searched for the config file
const PARENT_SEARCH_DEPTH: usize = 5;

fn candidate_paths(cwd: &Path) -> Vec<PathBuf> {
    cwd.ancestors()
        .take(PARENT_SEARCH_DEPTH + 1)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .collect()
}

/// Locate `tractprint.toml`
///
/// `TRACTPRINT_CONFIG_PATH` wins when set (and must exist). Otherwise the
/// working directory and up to five of its parents are searched, nearest first.
///
/// # Errors
///
/// `ConfigError::FileNotFound` listing every location tried
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(explicit) = env::var(CONFIG_PATH_ENV_VAR) {
        let path = PathBuf::from(explicit);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(ConfigError::FileNotFound(format!(
                "{}={}",
                CONFIG_PATH_ENV_VAR,
                path.display()
            )))
        };
    }

    let candidates = env::current_dir()
        .map(|cwd| candidate_paths(&cwd))
        .unwrap_or_default();
    if let Some(found) = candidates.iter().find(|path| path.is_file()) {
        return Ok(found.clone());
    }

    let searched = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(ConfigError::FileNotFound(searched))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<PipelineConfig> {
    let config_file = if let Some(path) = config_path {
        path.to_path_buf()
    } else {
        find_config_file()?
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: PipelineConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "true" || value == "1" || value == "yes"
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `TRACTPRINT_DATA_DIR` -> `pipeline.data_dir`
/// - `TRACTPRINT_RECREATE` -> `pipeline.recreate`
/// - `TRACTPRINT_WORKERS` -> `pipeline.workers`
/// - `TRACTPRINT_LOG_LEVEL` -> `logging.level`
/// - `TRACTPRINT_LOG_DIR` -> `logging.log_dir`
pub fn apply_environment_overrides(config: &mut PipelineConfig) {
    if let Ok(value) = env::var("TRACTPRINT_DATA_DIR") {
        config.pipeline.data_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("TRACTPRINT_RECREATE") {
        config.pipeline.recreate = parse_flag(&value);
    }
    if let Ok(value) = env::var("TRACTPRINT_WORKERS") {
        if let Ok(workers) = value.parse::<usize>() {
            config.pipeline.workers = workers;
        }
    }
    if let Ok(value) = env::var("TRACTPRINT_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("TRACTPRINT_LOG_DIR") {
        config.logging.log_dir = Some(PathBuf::from(value));
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - Map of CLI arguments (e.g., `{"data_dir": "/data/HCP", "workers": "8"}`)
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for values that cannot be parsed. Unlike
/// environment overrides, an explicit CLI value is never silently ignored.
pub fn apply_cli_overrides(
    config: &mut PipelineConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(value) = cli_args.get("data_dir") {
        config.pipeline.data_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("recreate") {
        config.pipeline.recreate = parse_flag(value);
    }
    if let Some(value) = cli_args.get("workers") {
        config.pipeline.workers = value
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue(format!("workers = '{}'", value)))?;
    }
    if let Some(value) = cli_args.get("hemispheres") {
        config.pipeline.hemispheres = value
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<Hemisphere>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::InvalidValue(format!("hemispheres ({})", e)))?;
    }
    if let Some(value) = cli_args.get("export_npz") {
        config.storage.export_npz = parse_flag(value);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    if let Some(value) = cli_args.get("log_dir") {
        config.logging.log_dir = Some(PathBuf::from(value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var(CONFIG_PATH_ENV_VAR, config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var(CONFIG_PATH_ENV_VAR);

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_candidate_paths_nearest_first() {
        let candidates = candidate_paths(Path::new("/a/b/c/d/e/f/g"));
        assert_eq!(candidates.len(), PARENT_SEARCH_DEPTH + 1);
        assert_eq!(candidates[0], PathBuf::from("/a/b/c/d/e/f/g/tractprint.toml"));
        assert_eq!(candidates[1], PathBuf::from("/a/b/c/d/e/f/tractprint.toml"));

        assert_eq!(candidate_paths(Path::new("/")), vec![PathBuf::from("/tractprint.toml")]);
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::remove_var("TRACTPRINT_DATA_DIR");
        env::remove_var("TRACTPRINT_WORKERS");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[pipeline]").unwrap();
        writeln!(file, "data_dir = \"/data/HCP\"").unwrap();
        writeln!(file, "workers = 4").unwrap();
        writeln!(file, "[layout]").unwrap();
        writeln!(file, "mask_file = \"DTI/mask.nii\"").unwrap();

        let config = load_config(Some(config_path.as_path()), None).unwrap();

        assert_eq!(config.pipeline.data_dir, PathBuf::from("/data/HCP"));
        assert_eq!(config.pipeline.workers, 4);
        assert!(!config.pipeline.recreate);
        assert_eq!(config.layout.mask_file, PathBuf::from("DTI/mask.nii"));
        assert_eq!(config.layout.dump_file, "fdt_matrix2.dot");
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[pipeline\nworkers = ").unwrap();

        let result = load_config(Some(config_path.as_path()), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = PipelineConfig::default();

        env::set_var("TRACTPRINT_DATA_DIR", "/scratch/subjects");
        env::set_var("TRACTPRINT_RECREATE", "yes");

        apply_environment_overrides(&mut config);

        env::remove_var("TRACTPRINT_DATA_DIR");
        env::remove_var("TRACTPRINT_RECREATE");

        assert_eq!(config.pipeline.data_dir, PathBuf::from("/scratch/subjects"));
        assert!(config.pipeline.recreate);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = PipelineConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("workers".to_string(), "8".to_string());
        cli_args.insert("hemispheres".to_string(), "L".to_string());

        apply_cli_overrides(&mut config, &cli_args).unwrap();

        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.pipeline.hemispheres, vec![Hemisphere::Left]);
    }

    #[test]
    fn test_cli_rejects_bad_workers() {
        let mut config = PipelineConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("workers".to_string(), "many".to_string());

        let result = apply_cli_overrides(&mut config, &cli_args);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[pipeline]").unwrap();
        writeln!(file, "data_dir = \"/file\"").unwrap();
        writeln!(file, "workers = 2").unwrap();

        env::set_var("TRACTPRINT_DATA_DIR", "/env");
        env::set_var("TRACTPRINT_WORKERS", "6");

        let mut cli_args = HashMap::new();
        cli_args.insert("data_dir".to_string(), "/cli".to_string());

        let config = load_config(Some(config_path.as_path()), Some(&cli_args)).unwrap();

        env::remove_var("TRACTPRINT_DATA_DIR");
        env::remove_var("TRACTPRINT_WORKERS");

        // CLI wins for data_dir, env wins for workers (no CLI override)
        assert_eq!(config.pipeline.data_dir, PathBuf::from("/cli"));
        assert_eq!(config.pipeline.workers, 6);
    }
}
