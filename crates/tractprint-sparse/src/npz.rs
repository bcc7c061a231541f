// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Scipy-compatible `.npz` export
//!
//! Writes the same arrays `scipy.sparse.save_npz` produces for a
//! `csr_matrix`, so `scipy.sparse.load_npz` reads the result directly.

use npyz::npz::NpzWriter;
use npyz::sparse::Csr;
use sprs::CsMat;
use std::path::Path;

use crate::format::write_atomically;
use crate::{SparseError, SparseResult};

/// Export a matrix as a scipy `csr_matrix` archive
pub fn export_npz<P: AsRef<Path>>(matrix: &CsMat<f64>, path: P) -> SparseResult<()> {
    if matrix.is_csc() {
        return export_npz(&matrix.to_other_storage(), path);
    }

    let csr = Csr {
        shape: [matrix.rows() as u64, matrix.cols() as u64],
        data: matrix.data().to_vec(),
        indices: matrix.indices().iter().map(|&i| i as u64).collect(),
        indptr: matrix.proper_indptr().into_owned(),
    };

    write_atomically(path.as_ref(), |writer| {
        let mut npz = NpzWriter::new(writer);
        csr.write_npz(&mut npz).map_err(|e| SparseError::Npz(e.to_string()))?;
        Ok(())
    })
}
