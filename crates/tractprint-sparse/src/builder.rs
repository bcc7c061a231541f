/*
 * Copyright 2025 Neuraville Inc.
 */

//! Coordinate-to-CSR conversion and dump compression

use sprs::{CsMat, TriMat};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::format::{save_matrix, StorageOptions};
use crate::triplet::{read_triplets, Triplets};
use crate::{SparseError, SparseResult};

/// Build a CSR matrix from 0-indexed triplets
///
/// Duplicate `(row, col)` pairs are summed. With `shape = None` the shape is
/// `(max_row + 1, max_col + 1)`; an explicit shape must cover every index.
///
/// # Errors
/// `EmptyInput` for an empty stream without an explicit shape,
/// `IndexOutOfRange` when an index falls outside the explicit shape.
/// Allocation of the CSR arrays is not fallible; see [`read_triplets`].
pub fn build_matrix(triplets: Triplets, shape: Option<(usize, usize)>) -> SparseResult<CsMat<f64>> {
    let shape = match (shape, triplets.inferred_shape()) {
        (Some(shape), Some((rows, cols))) => {
            if rows > shape.0 || cols > shape.1 {
                return Err(SparseError::IndexOutOfRange {
                    row: rows - 1,
                    col: cols - 1,
                    shape,
                });
            }
            shape
        }
        (Some(shape), None) => shape,
        (None, Some(inferred)) => inferred,
        (None, None) => {
            return Err(SparseError::EmptyInput(
                "triplet stream contains no records".to_string(),
            ))
        }
    };

    let Triplets {
        rows, cols, values, ..
    } = triplets;
    let tri = TriMat::from_triplets(shape, rows, cols, values);
    Ok(tri.to_csr())
}

/// Options for [`compress_dump`]
#[derive(Debug, Clone, Default)]
pub struct CompressOptions {
    /// Ignore an existing artifact and rebuild from the dump
    pub recreate: bool,
    /// Explicit matrix shape; inferred from the dump when `None`
    pub shape: Option<(usize, usize)>,
    pub storage: StorageOptions,
    /// Also write a scipy `.npz` copy of the matrix here
    pub export_npz: Option<PathBuf>,
}

/// Result of a dump compression attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressOutcome {
    /// Dump converted, artifact written
    Compressed { rows: usize, cols: usize, nnz: usize },
    /// Artifact already present; nothing written
    AlreadyCompressed,
    /// Neither dump nor artifact exists
    MissingInput,
}

/// Convert a coordinate-list dump into a persisted CSR artifact
///
/// | dump | artifact | result |
/// |------|----------|--------|
/// | yes  | no       | build, save, remove dump → `Compressed` |
/// | any  | yes      | `AlreadyCompressed` (unless `recreate` and the dump exists) |
/// | no   | no       | `MissingInput` |
///
/// The dump is removed only after the artifact (and the `.npz` copy, when
/// requested) is durable. A failed removal is logged and otherwise ignored.
pub fn compress_dump<P, Q>(dump: P, artifact: Q, options: &CompressOptions) -> SparseResult<CompressOutcome>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let dump = dump.as_ref();
    let artifact = artifact.as_ref();
    let dump_exists = dump.exists();
    let artifact_exists = artifact.exists();

    if artifact_exists && !(options.recreate && dump_exists) {
        if options.recreate {
            warn!(
                target: "tractprint-sparse",
                "Recreate requested but dump {} is gone; keeping {}",
                dump.display(),
                artifact.display()
            );
        } else if dump_exists {
            warn!(
                target: "tractprint-sparse",
                "Both {} and {} exist; keeping the dump untouched",
                dump.display(),
                artifact.display()
            );
        }
        info!(target: "tractprint-sparse", "Already compressed: {}", artifact.display());
        return Ok(CompressOutcome::AlreadyCompressed);
    }

    if !dump_exists {
        warn!(target: "tractprint-sparse", "Dump does not exist: {}", dump.display());
        return Ok(CompressOutcome::MissingInput);
    }

    let triplets = read_triplets(dump)?;
    let matrix = build_matrix(triplets, options.shape)?;
    save_matrix(&matrix, artifact, &options.storage)?;
    if let Some(npz_path) = &options.export_npz {
        export_npz_copy(&matrix, npz_path)?;
    }

    info!(
        target: "tractprint-sparse",
        "Compressed and saved {} ({}x{}, {} nnz)",
        artifact.display(),
        matrix.rows(),
        matrix.cols(),
        matrix.nnz()
    );

    if let Err(e) = fs::remove_file(dump) {
        warn!(
            target: "tractprint-sparse",
            "Failed to remove dump {} after compression: {}",
            dump.display(),
            e
        );
    }

    Ok(CompressOutcome::Compressed {
        rows: matrix.rows(),
        cols: matrix.cols(),
        nnz: matrix.nnz(),
    })
}

#[cfg(feature = "npz")]
fn export_npz_copy(matrix: &CsMat<f64>, path: &Path) -> SparseResult<()> {
    crate::npz::export_npz(matrix, path)?;
    debug!(target: "tractprint-sparse", "Exported {}", path.display());
    Ok(())
}

#[cfg(not(feature = "npz"))]
fn export_npz_copy(_matrix: &CsMat<f64>, path: &Path) -> SparseResult<()> {
    warn!(
        target: "tractprint-sparse",
        "Skipping {}: built without the npz feature",
        path.display()
    );
    Ok(())
}
