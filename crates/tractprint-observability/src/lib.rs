// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # tractprint-observability
//!
//! Logging setup shared by the tractprint crates and tools.
//!
//! Every crate logs through `tracing` with an explicit target equal to its
//! crate name (`target: "tractprint-sparse"`), so per-crate debug flags map
//! directly onto `EnvFilter` directives.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Log target of the umbrella crate and the batch tool
///
/// Not a prefix of any member crate's target, so raising it leaves the
/// members alone.
pub const BATCH_TARGET: &str = "tractprint::batch";

/// Known tractprint log targets for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    BATCH_TARGET,
    "tractprint-sparse",
    "tractprint-volume",
    "tractprint-pipeline",
];
