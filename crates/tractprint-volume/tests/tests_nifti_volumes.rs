// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reading NIfTI-1 files from disk and projecting them.

use std::fs;
use std::path::Path;

use nifti::writer::WriterOptions;
use nifti::DataElement;
use nifti_ndarray::{Array, IxDyn, ShapeBuilder};
use tempfile::tempdir;
use tractprint_volume::{bundle_sizes, project, read_nifti, LabelVolume, MaskVolume, VolumeError};

/// Write `data` (x-fastest) with the element type as the stored datatype
fn write_volume<A>(path: &Path, dims: &[usize], data: Vec<A>)
where
    A: DataElement + bytemuck::Pod,
{
    let array = Array::from_shape_vec(IxDyn(dims).f(), data).unwrap();
    WriterOptions::new(path).write_nifti(&array).unwrap();
}

/// Overwrite `scl_slope` and `scl_inter` in a single-file `.nii` header
fn set_scaling(path: &Path, slope: f32, inter: f32) {
    let mut bytes = fs::read(path).unwrap();
    bytes[112..116].copy_from_slice(&slope.to_ne_bytes());
    bytes[116..120].copy_from_slice(&inter.to_ne_bytes());
    fs::write(path, bytes).unwrap();
}

#[test]
fn test_mask_voxel_order_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mask.nii");
    // 2x2x1, x-fastest: (0,0) (1,0) (0,1) (1,1)
    write_volume(&path, &[2, 2, 1], vec![0u8, 1, 1, 0]);

    let mask = MaskVolume::load(&path).unwrap();
    assert_eq!(mask.dim(), (2, 2, 1));
    assert_eq!(mask.voxels(), vec![[1, 0, 0], [0, 1, 0]]);
}

#[test]
fn test_uint8_mask() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mask.nii.gz");
    write_volume(&path, &[3, 1, 1], vec![1u8, 0, 255]);

    let mask = MaskVolume::load(&path).unwrap();
    assert_eq!(mask.data().as_slice_memory_order().unwrap(), &[1.0, 0.0, 255.0]);
}

#[test]
fn test_int16_labels() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("labels.nii");
    write_volume(&path, &[2, 1, 1, 2], vec![1i16, -3, 0, 7]);

    let label = LabelVolume::load(&path).unwrap();
    assert_eq!(label.channels(), 2);
    assert_eq!(label.data()[[1, 0, 0, 0]], -3.0);
    assert_eq!(label.data()[[1, 0, 0, 1]], 7.0);
}

#[test]
fn test_float32_and_float64_agree() {
    let dir = tempdir().unwrap();
    let single = dir.path().join("single.nii");
    let double = dir.path().join("double.nii");
    write_volume(&single, &[2, 2, 1], vec![0.5f32, 0.25, 1.0, 0.0]);
    write_volume(&double, &[2, 2, 1], vec![0.5f64, 0.25, 1.0, 0.0]);

    assert_eq!(read_nifti(&single).unwrap(), read_nifti(&double).unwrap());
}

#[test]
fn test_scaling_is_applied() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scaled.nii");
    write_volume(&path, &[2, 1, 1], vec![2i16, 4]);
    set_scaling(&path, 0.5, 1.0);

    let array = read_nifti(&path).unwrap();
    assert_eq!(array.iter().copied().collect::<Vec<_>>(), vec![2.0, 3.0]);
}

#[test]
fn test_label_channels_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("labels.nii");
    // 3x1x1x2: channel 0 = [1, 1, 0], channel 1 = [0, 0, 1]
    write_volume(&path, &[3, 1, 1, 2], vec![1.0f32, 1.0, 0.0, 0.0, 0.0, 1.0]);

    let label = LabelVolume::load(&path).unwrap();
    assert_eq!(label.spatial_dim(), (3, 1, 1));
    assert_eq!(label.channels(), 2);
    assert_eq!(bundle_sizes(&label).as_slice(), &[2.0, 1.0]);
}

#[test]
fn test_project_files_with_mismatched_grid() {
    let dir = tempdir().unwrap();
    let mask_path = dir.path().join("mask.nii");
    let label_path = dir.path().join("labels.nii");
    // mask 4x1x1, label 3x1x1x1: the fourth mask voxel falls in padding
    write_volume(&mask_path, &[4, 1, 1], vec![1u8, 0, 1, 1]);
    write_volume(&label_path, &[3, 1, 1, 1], vec![0.5f32, 0.25, 1.0]);

    let projection = project(
        &LabelVolume::load(&label_path).unwrap(),
        &MaskVolume::load(&mask_path).unwrap(),
    )
    .unwrap();

    assert!(projection.reconciled);
    assert_eq!(projection.matrix.shape(), (3, 1));
    assert_eq!(projection.matrix.get(0, 0), Some(&0.5));
    assert_eq!(projection.matrix.get(1, 0), Some(&1.0));
    assert_eq!(projection.matrix.get(2, 0), None);
    assert_eq!(projection.bundle_sizes.as_slice(), &[1.75]);
}

#[test]
fn test_garbage_file_is_file_access_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.nii");
    fs::write(&path, b"not a nifti file").unwrap();
    assert!(matches!(MaskVolume::load(&path), Err(VolumeError::FileAccess { .. })));
}
