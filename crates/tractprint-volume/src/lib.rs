// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # tractprint Volumes
//!
//! Reads the bundle segmentation (4-D label volume) and brain mask (3-D) that
//! the segmentation tools produce, and projects the labels onto the mask voxels
//! as a sparse voxel-to-bundle matrix.
//!
//! Voxel order everywhere in this crate is x-fastest, then y, then z. That is
//! the order in which the tractography tool numbers the voxels of its target
//! mask, so row `i` of the projection matches column `i` of the connectivity
//! matrix.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

use std::path::PathBuf;
use thiserror::Error;

mod projector;
mod volume;

pub use projector::*;
pub use volume::*;

/// Volume errors
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("Cannot read volume {path}: {reason}")]
    FileAccess { path: PathBuf, reason: String },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Unsupported volume shape {shape:?}: {reason}")]
    Shape { shape: Vec<usize>, reason: String },
}

pub type VolumeResult<T> = std::result::Result<T, VolumeError>;
