/*
 * Copyright 2025 Neuraville Inc.
 */

//! Label and mask volumes
//!
//! NIfTI stores voxels x-fastest, so file data is wrapped in Fortran-order
//! arrays and indexed as `[x, y, z]` / `[x, y, z, channel]`.

use ndarray::{Array3, Array4, ArrayD, Axis, Ix3, Ix4, IxDyn, ShapeBuilder};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use std::path::Path;
use tracing::debug;

use crate::{VolumeError, VolumeResult};

/// Read a NIfTI-1 file (`.nii` or `.nii.gz`) as an `f64` array
///
/// Any stored datatype (uint8, int16, float32, ...) is converted, and
/// `scl_slope` / `scl_inter` are applied when the slope is nonzero.
pub fn read_nifti<P: AsRef<Path>>(path: P) -> VolumeResult<ArrayD<f64>> {
    let path = path.as_ref();
    let file_access = |reason: String| VolumeError::FileAccess {
        path: path.to_path_buf(),
        reason,
    };

    std::fs::metadata(path).map_err(|e| file_access(e.to_string()))?;

    let object = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| file_access(e.to_string()))?;
    let datatype = object.header().data_type().ok();
    let decoded = object
        .into_volume()
        .into_ndarray::<f64>()
        .map_err(|e| file_access(e.to_string()))?;

    // nifti builds on its own ndarray release; re-wrap the x-fastest data
    let dims = decoded.shape().to_vec();
    let data: Vec<f64> = decoded.t().iter().copied().collect();

    debug!(
        target: "tractprint-volume",
        "Loaded {} with shape {:?} ({:?})",
        path.display(),
        dims,
        datatype
    );

    ArrayD::from_shape_vec(IxDyn(&dims).f(), data).map_err(|e| VolumeError::Shape {
        shape: dims,
        reason: e.to_string(),
    })
}

/// Multi-channel bundle segmentation, indexed `[x, y, z, channel]`
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVolume {
    data: Array4<f64>,
}

impl LabelVolume {
    pub fn from_array(data: Array4<f64>) -> Self {
        Self { data }
    }

    /// Accept a 4-D array, or a 3-D array as a single channel
    pub fn from_dyn(data: ArrayD<f64>) -> VolumeResult<Self> {
        let shape = data.shape().to_vec();
        let data = match data.ndim() {
            3 => data
                .into_dimensionality::<Ix3>()
                .map(|d| d.insert_axis(Axis(3))),
            4 => data.into_dimensionality::<Ix4>(),
            _ => {
                return Err(VolumeError::Shape {
                    shape,
                    reason: "label volume must be 3-D or 4-D".to_string(),
                })
            }
        }
        .map_err(|e| VolumeError::Shape {
            shape: shape.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { data })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> VolumeResult<Self> {
        Self::from_dyn(read_nifti(path)?)
    }

    pub fn data(&self) -> &Array4<f64> {
        &self.data
    }

    pub fn spatial_dim(&self) -> (usize, usize, usize) {
        let (x, y, z, _) = self.data.dim();
        (x, y, z)
    }

    pub fn channels(&self) -> usize {
        self.data.len_of(Axis(3))
    }
}

/// Binary brain mask, indexed `[x, y, z]`; nonzero voxels are included
#[derive(Debug, Clone, PartialEq)]
pub struct MaskVolume {
    data: Array3<f64>,
}

impl MaskVolume {
    pub fn from_array(data: Array3<f64>) -> Self {
        Self { data }
    }

    /// Accept a 3-D array, or a 4-D array with a single trailing channel
    pub fn from_dyn(data: ArrayD<f64>) -> VolumeResult<Self> {
        let shape = data.shape().to_vec();
        let data = match shape.as_slice() {
            [_, _, _] => data.into_dimensionality::<Ix3>(),
            [_, _, _, 1] => data.index_axis_move(Axis(3), 0).into_dimensionality::<Ix3>(),
            _ => {
                return Err(VolumeError::Shape {
                    shape: shape.clone(),
                    reason: "mask volume must be 3-D".to_string(),
                })
            }
        }
        .map_err(|e| VolumeError::Shape {
            shape: shape.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { data })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> VolumeResult<Self> {
        Self::from_dyn(read_nifti(path)?)
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Coordinates of nonzero voxels, x-fastest then y then z
    pub fn voxels(&self) -> Vec<[usize; 3]> {
        let (nx, ny, nz) = self.data.dim();
        let mut voxels = Vec::new();
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    if self.data[[x, y, z]] != 0.0 {
                        voxels.push([x, y, z]);
                    }
                }
            }
        }
        voxels
    }
}
