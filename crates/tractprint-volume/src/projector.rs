// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Voxel-to-bundle projection.

Indexes the label volume at every nonzero mask voxel and stores the result as
a sparse matrix with one row per mask voxel and one column per bundle. When
the label volume and the mask disagree on their spatial shape, the label
volume is truncated or zero-padded at the far boundary to the mask's shape.
Nothing is resampled or registered.
*/

use ndarray::parallel::prelude::*;
use ndarray::{s, Array4, Axis, ShapeBuilder};
use sprs::{CsMat, TriMat};
use tracing::{debug, warn};

use crate::volume::{LabelVolume, MaskVolume};
use crate::{VolumeError, VolumeResult};

/// Per-bundle size: the sum of the channel over the whole label volume
#[derive(Debug, Clone, PartialEq)]
pub struct BundleSizes(Vec<f64>);

impl BundleSizes {
    pub fn new(sizes: Vec<f64>) -> Self {
        Self(sizes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, bundle: usize) -> Option<f64> {
        self.0.get(bundle).copied()
    }

    /// Size usable as a divisor; `None` unless positive and finite
    pub fn divisor(&self, bundle: usize) -> Option<f64> {
        self.get(bundle).filter(|size| size.is_finite() && *size > 0.0)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Sum every channel over the full volume (not restricted to any mask)
pub fn bundle_sizes(label: &LabelVolume) -> BundleSizes {
    let sizes: Vec<f64> = label
        .data()
        .axis_iter(Axis(3))
        .into_par_iter()
        .map(|channel| channel.sum())
        .collect();
    BundleSizes(sizes)
}

/// Nonzero mask voxels in projection row order
pub fn mask_voxels(mask: &MaskVolume) -> Vec<[usize; 3]> {
    mask.voxels()
}

/// Copy the label volume into a zero-filled array shaped like the mask
///
/// The overlap `[0..min(a, b)]` along each spatial axis is copied from the
/// origin; everything else is zero. Returns the input unchanged when the
/// shapes already agree.
pub fn reconcile_shape(label: &Array4<f64>, mask_dim: (usize, usize, usize)) -> Array4<f64> {
    let (lx, ly, lz, channels) = label.dim();
    let (mx, my, mz) = mask_dim;
    if (lx, ly, lz) == (mx, my, mz) {
        return label.clone();
    }

    let (cx, cy, cz) = (lx.min(mx), ly.min(my), lz.min(mz));
    let mut reshaped = Array4::<f64>::zeros((mx, my, mz, channels).f());
    reshaped
        .slice_mut(s![..cx, ..cy, ..cz, ..])
        .assign(&label.slice(s![..cx, ..cy, ..cz, ..]));
    reshaped
}

/// Voxel-to-bundle matrix plus the bundle sizes it is normalized by
#[derive(Debug, Clone)]
pub struct Projection {
    /// Rows = nonzero mask voxels (x-fastest), columns = bundles
    pub matrix: CsMat<f64>,
    pub bundle_sizes: BundleSizes,
    /// Whether the label volume had to be truncated / zero-padded
    pub reconciled: bool,
}

impl Projection {
    pub fn voxels(&self) -> usize {
        self.matrix.rows()
    }

    pub fn bundles(&self) -> usize {
        self.matrix.cols()
    }
}

/// Project the label volume onto the mask voxels
///
/// # Errors
/// `EmptyInput` when the label volume has no channels or the mask has no
/// nonzero voxels.
pub fn project(label: &LabelVolume, mask: &MaskVolume) -> VolumeResult<Projection> {
    let channels = label.channels();
    if channels == 0 {
        return Err(VolumeError::EmptyInput("label volume has zero channels".to_string()));
    }

    let bundle_sizes = bundle_sizes(label);

    let voxels = mask_voxels(mask);
    if voxels.is_empty() {
        return Err(VolumeError::EmptyInput("mask has no nonzero voxels".to_string()));
    }

    let reconciled = label.spatial_dim() != mask.dim();
    let reshaped;
    let data = if reconciled {
        warn!(
            target: "tractprint-volume",
            "Label volume shape {:?} differs from mask shape {:?}; truncating/zero-padding from the origin",
            label.spatial_dim(),
            mask.dim()
        );
        reshaped = reconcile_shape(label.data(), mask.dim());
        &reshaped
    } else {
        label.data()
    };

    let mut tri = TriMat::new((voxels.len(), channels));
    for (row, &[x, y, z]) in voxels.iter().enumerate() {
        for channel in 0..channels {
            let value = data[[x, y, z, channel]];
            if value != 0.0 {
                tri.add_triplet(row, channel, value);
            }
        }
    }
    let matrix: CsMat<f64> = tri.to_csr();

    debug!(
        target: "tractprint-volume",
        "Projection: {} mask voxels x {} bundles, {} nnz",
        matrix.rows(),
        matrix.cols(),
        matrix.nnz()
    );

    Ok(Projection {
        matrix,
        bundle_sizes,
        reconciled,
    })
}
