//! Per-crate log level flags
//!
//! `--debug-<crate>` and `--trace-<crate>` raise the level of one crate.
//! Crates may be named in full (`tractprint-sparse`) or by their suffix
//! (`sparse`, `batch`). `--debug-all` raises every known crate.

use std::collections::BTreeMap;
use std::env;

use tracing::Level;

use crate::KNOWN_CRATES;

/// Environment variable holding comma-separated crate names, or `all`
pub const DEBUG_ENV_VAR: &str = "TRACTPRINT_DEBUG";

/// Log level overrides collected from arguments and the environment
///
/// # Example
/// ```rust
/// use tractprint_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-sparse".to_string()]);
/// assert!(flags.is_enabled("tractprint-sparse"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrateDebugFlags {
    levels: BTreeMap<String, Level>,
    /// Crate names that matched no known crate
    pub unknown: Vec<String>,
}

fn canonical_crate(name: &str) -> Option<&'static str> {
    KNOWN_CRATES.iter().copied().find(|known| {
        *known == name
            || known.strip_prefix("tractprint-") == Some(name)
            || known.strip_prefix("tractprint::") == Some(name)
    })
}

impl CrateDebugFlags {
    /// Collect `--debug-*` / `--trace-*` flags, ignoring every other argument
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = Self::default();
        for arg in args {
            if arg == "--debug-all" {
                flags.raise_all(Level::DEBUG);
            } else if let Some(name) = arg.strip_prefix("--debug-") {
                flags.raise(name, Level::DEBUG);
            } else if let Some(name) = arg.strip_prefix("--trace-") {
                flags.raise(name, Level::TRACE);
            }
        }
        flags
    }

    /// Parse the value of [`DEBUG_ENV_VAR`]
    pub fn from_env_value(value: &str) -> Self {
        let mut flags = Self::default();
        if value.trim() == "all" {
            flags.raise_all(Level::DEBUG);
            return flags;
        }
        for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            flags.raise(name, Level::DEBUG);
        }
        flags
    }

    /// Combine two flag sets, keeping the more verbose level per crate
    pub fn merge(mut self, other: CrateDebugFlags) -> Self {
        for (name, level) in other.levels {
            self.set_at_least(name, level);
        }
        self.unknown.extend(other.unknown);
        self
    }

    fn raise(&mut self, name: &str, level: Level) {
        match canonical_crate(name) {
            Some(crate_name) => self.set_at_least(crate_name.to_string(), level),
            None => self.unknown.push(name.to_string()),
        }
    }

    fn raise_all(&mut self, level: Level) {
        for crate_name in KNOWN_CRATES {
            self.set_at_least(crate_name.to_string(), level);
        }
    }

    // `Level` orders TRACE as the greatest
    fn set_at_least(&mut self, crate_name: String, level: Level) {
        let entry = self.levels.entry(crate_name).or_insert(level);
        if level > *entry {
            *entry = level;
        }
    }

    /// Override for a crate, if any
    pub fn level_for(&self, crate_name: &str) -> Option<Level> {
        let crate_name = canonical_crate(crate_name).unwrap_or(crate_name);
        self.levels.get(crate_name).copied()
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.level_for(crate_name).is_some()
    }

    pub fn any_enabled(&self) -> bool {
        !self.levels.is_empty()
    }

    /// `EnvFilter` directives: one per overridden crate, then the default
    ///
    /// e.g. `"tractprint-pipeline=debug,warn"`
    pub fn to_filter_string(&self, default_level: &str) -> String {
        self.levels
            .iter()
            .map(|(name, level)| format!("{}={}", name, level.as_str().to_lowercase()))
            .chain(std::iter::once(default_level.to_lowercase()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// True for the arguments [`CrateDebugFlags::from_args`] consumes
///
/// Binaries with their own argument parser drop these before parsing.
pub fn is_level_flag(arg: &str) -> bool {
    arg.starts_with("--debug-") || arg.starts_with("--trace-")
}

/// Flags from the process arguments merged with [`DEBUG_ENV_VAR`]
pub fn parse_debug_flags() -> CrateDebugFlags {
    let flags = CrateDebugFlags::from_args(env::args());
    match env::var(DEBUG_ENV_VAR) {
        Ok(value) => flags.merge(CrateDebugFlags::from_env_value(&value)),
        Err(_) => flags,
    }
}

/// Help text listing the flags and the crates they accept
pub fn debug_flags_help() -> String {
    let crates = KNOWN_CRATES
        .iter()
        .map(|name| format!("    {}", name))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Log level flags:\n  --debug-all            debug logging for every crate\n  \
         --debug-<crate>        debug logging for one crate\n  \
         --trace-<crate>        trace logging for one crate\n\n\
         Crates (full name or suffix, e.g. `sparse`):\n{}\n\n\
         {}=<crate>[,<crate>] or {}=all has the same effect as --debug-<crate>\n",
        crates, DEBUG_ENV_VAR, DEBUG_ENV_VAR
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_and_short_names() {
        let flags = CrateDebugFlags::from_args(args(&["--debug-tractprint-sparse", "--debug-volume"]));
        assert!(flags.is_enabled("tractprint-sparse"));
        assert!(flags.is_enabled("tractprint-volume"));
        assert!(flags.is_enabled("volume"));
        assert!(!flags.is_enabled("tractprint-pipeline"));
    }

    #[test]
    fn test_pipeline_arguments_are_ignored() {
        let flags = CrateDebugFlags::from_args(args(&["--recreate", "--data-dir", "/data", "--workers", "4"]));
        assert!(!flags.any_enabled());
        assert!(flags.unknown.is_empty());
    }

    #[test]
    fn test_level_flags_recognized() {
        assert!(is_level_flag("--debug-all"));
        assert!(is_level_flag("--trace-sparse"));
        assert!(!is_level_flag("--data-dir"));
        assert!(!is_level_flag("--debug"));
    }

    #[test]
    fn test_unknown_crate_recorded() {
        let flags = CrateDebugFlags::from_args(args(&["--debug-tractprint-gpu"]));
        assert!(!flags.any_enabled());
        assert_eq!(flags.unknown, vec!["tractprint-gpu".to_string()]);
    }

    #[test]
    fn test_trace_wins_over_debug() {
        let flags = CrateDebugFlags::from_args(args(&["--trace-pipeline", "--debug-all"]));
        assert_eq!(flags.level_for("tractprint-pipeline"), Some(Level::TRACE));
        assert_eq!(flags.level_for("tractprint-sparse"), Some(Level::DEBUG));
    }

    #[test]
    fn test_filter_string() {
        let flags = CrateDebugFlags::from_args(args(&["--debug-pipeline"]));
        assert_eq!(flags.to_filter_string("WARN"), "tractprint-pipeline=debug,warn");
        assert_eq!(CrateDebugFlags::default().to_filter_string("info"), "info");
    }

    #[test]
    fn test_batch_target_does_not_cover_members() {
        let flags = CrateDebugFlags::from_args(args(&["--debug-batch"]));
        assert!(flags.is_enabled(crate::BATCH_TARGET));
        assert!(!flags.is_enabled("tractprint-sparse"));
        assert_eq!(flags.to_filter_string("info"), "tractprint::batch=debug,info");

        // a bare prefix would match every member target
        let bare = CrateDebugFlags::from_args(args(&["--debug-tractprint"]));
        assert!(!bare.any_enabled());
        assert_eq!(bare.unknown, vec!["tractprint".to_string()]);
    }

    #[test]
    fn test_env_value_merge() {
        let from_env = CrateDebugFlags::from_env_value(" sparse , ,tractprint-volume");
        let merged = CrateDebugFlags::from_args(args(&["--trace-sparse"])).merge(from_env);
        assert_eq!(merged.level_for("sparse"), Some(Level::TRACE));
        assert_eq!(merged.level_for("volume"), Some(Level::DEBUG));

        let all = CrateDebugFlags::from_env_value("all");
        assert!(KNOWN_CRATES.iter().all(|name| all.is_enabled(name)));
    }
}
