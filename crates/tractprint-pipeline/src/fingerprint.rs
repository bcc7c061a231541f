/*
 * Copyright 2025 Neuraville Inc.
 */

//! Size-normalized connectivity fingerprints
//!
//! `fingerprint[r, k] = (connectivity × projection)[r, k] / size[k]`

use sprs::CsMat;
use tracing::{debug, info, warn};
use tractprint_config::PipelineConfig;
use tractprint_sparse::{load_matrix, save_matrix, SparseError, StorageOptions};
use tractprint_volume::{project, BundleSizes, LabelVolume, MaskVolume, Projection};

use crate::unit::UnitPaths;
use crate::{PipelineError, PipelineResult};

/// Size of bundle `k` as a divisor
///
/// # Errors
/// `InvalidNormalization` when the size is zero, negative, not finite or
/// missing.
pub fn bundle_divisor(sizes: &BundleSizes, bundle: usize) -> PipelineResult<f64> {
    sizes
        .divisor(bundle)
        .ok_or_else(|| PipelineError::InvalidNormalization {
            bundle,
            size: sizes.get(bundle).unwrap_or(f64::NAN),
        })
}

/// Divide every entry of column `k` by `size[k]`
///
/// Every bundle size must be a valid divisor, even for columns with no
/// stored entries, so a zero-size bundle never yields a silently empty
/// column.
pub fn normalize_fingerprint(product: CsMat<f64>, sizes: &BundleSizes) -> PipelineResult<CsMat<f64>> {
    if sizes.len() != product.cols() {
        return Err(PipelineError::BundleCount {
            columns: product.cols(),
            sizes: sizes.len(),
        });
    }

    let divisors = (0..sizes.len())
        .map(|k| bundle_divisor(sizes, k))
        .collect::<PipelineResult<Vec<f64>>>()?;

    let product = if product.is_csr() {
        product
    } else {
        product.to_other_storage()
    };
    let shape = product.shape();
    let (indptr, indices, mut data) = product.into_raw_storage();
    for (value, &col) in data.iter_mut().zip(indices.iter()) {
        *value /= divisors[col];
    }

    let normalized = CsMat::try_new(shape, indptr, indices, data)
        .map_err(|(_, _, _, e)| SparseError::Structure(e.to_string()))?;
    Ok(normalized)
}

/// Give the connectivity matrix `cols` columns
///
/// Target voxels past the last stored column carried no streamlines, so the
/// extra columns are all zero. Shrinking is never allowed.
pub fn widen_columns(connectivity: CsMat<f64>, cols: usize) -> PipelineResult<CsMat<f64>> {
    let (rows, stored_cols) = connectivity.shape();
    if stored_cols == cols {
        return Ok(connectivity);
    }
    if stored_cols > cols {
        return Err(PipelineError::ShapeMismatch {
            connectivity: (rows, stored_cols),
            projection: (cols, 0),
        });
    }

    debug!(
        target: "tractprint-pipeline",
        "Widening connectivity from {} to {} columns",
        stored_cols,
        cols
    );

    let connectivity = if connectivity.is_csr() {
        connectivity
    } else {
        connectivity.to_other_storage()
    };
    let (indptr, indices, data) = connectivity.into_raw_storage();
    let widened = CsMat::try_new((rows, cols), indptr, indices, data)
        .map_err(|(_, _, _, e)| SparseError::Structure(e.to_string()))?;
    Ok(widened)
}

/// Multiply the connectivity matrix by the projection and normalize
pub fn compute_fingerprint(connectivity: CsMat<f64>, projection: &Projection) -> PipelineResult<CsMat<f64>> {
    let connectivity = widen_columns(connectivity, projection.voxels()).map_err(|e| match e {
        PipelineError::ShapeMismatch { connectivity, .. } => PipelineError::ShapeMismatch {
            connectivity,
            projection: projection.matrix.shape(),
        },
        other => other,
    })?;

    let product = &connectivity * &projection.matrix;
    normalize_fingerprint(product, &projection.bundle_sizes)
}

/// Options for [`generate_fingerprint`]
#[derive(Debug, Clone, Default)]
pub struct FingerprintOptions {
    /// Rebuild even if the fingerprint artifact exists
    pub recreate: bool,
    pub storage: StorageOptions,
    /// Also write a scipy `.npz` copy when the unit has an npz path
    pub export_npz: bool,
}

impl From<&PipelineConfig> for FingerprintOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            recreate: config.pipeline.recreate,
            storage: StorageOptions {
                compression: config.storage.compression,
            },
            export_npz: config.storage.export_npz,
        }
    }
}

/// Result of a fingerprint attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintOutcome {
    Written { rows: usize, bundles: usize, nnz: usize },
    /// Fingerprint artifact already present; nothing written
    AlreadyDone,
}

/// Load the volumes for a unit
pub(crate) fn load_projection(paths: &UnitPaths) -> PipelineResult<Projection> {
    let label = LabelVolume::load(&paths.labels)?;
    let mask = MaskVolume::load(&paths.mask)?;
    Ok(project(&label, &mask)?)
}

/// Compute and persist the fingerprint for an already projected unit
pub(crate) fn write_fingerprint(
    paths: &UnitPaths,
    projection: &Projection,
    options: &FingerprintOptions,
) -> PipelineResult<FingerprintOutcome> {
    let connectivity = load_matrix(&paths.matrix)?;
    let fingerprint = compute_fingerprint(connectivity, projection)?;
    save_matrix(&fingerprint, &paths.fingerprint, &options.storage)?;

    if options.export_npz {
        export_npz_copy(&fingerprint, paths)?;
    }

    info!(
        target: "tractprint-pipeline",
        "Fingerprint saved: {} ({}x{}, {} nnz)",
        paths.fingerprint.display(),
        fingerprint.rows(),
        fingerprint.cols(),
        fingerprint.nnz()
    );

    Ok(FingerprintOutcome::Written {
        rows: fingerprint.rows(),
        bundles: fingerprint.cols(),
        nnz: fingerprint.nnz(),
    })
}

#[cfg(feature = "npz")]
fn export_npz_copy(fingerprint: &CsMat<f64>, paths: &UnitPaths) -> PipelineResult<()> {
    if let Some(npz_path) = &paths.fingerprint_npz {
        tractprint_sparse::export_npz(fingerprint, npz_path)?;
        debug!(target: "tractprint-pipeline", "Exported {}", npz_path.display());
    }
    Ok(())
}

#[cfg(not(feature = "npz"))]
fn export_npz_copy(_fingerprint: &CsMat<f64>, _paths: &UnitPaths) -> PipelineResult<()> {
    warn!(target: "tractprint-pipeline", "npz export requested but the npz feature is disabled");
    Ok(())
}

/// Build the fingerprint artifact for one unit
///
/// Skips all work when the artifact exists and `recreate` is off. Otherwise
/// loads the connectivity artifact and both volumes, projects, multiplies,
/// normalizes and persists. Writes nothing but the fingerprint artifact(s).
pub fn generate_fingerprint(paths: &UnitPaths, options: &FingerprintOptions) -> PipelineResult<FingerprintOutcome> {
    if paths.fingerprint.exists() && !options.recreate {
        info!(
            target: "tractprint-pipeline",
            "Fingerprint already exists: {}",
            paths.fingerprint.display()
        );
        return Ok(FingerprintOutcome::AlreadyDone);
    }

    let projection = load_projection(paths)?;
    if projection.reconciled {
        warn!(
            target: "tractprint-pipeline",
            "Label volume for {} was reshaped to the mask grid",
            paths.unit_dir.display()
        );
    }
    write_fingerprint(paths, &projection, options)
}
