// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Dump-to-artifact conversion tests.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tempfile::tempdir;
use tractprint_sparse::{
    build_matrix, compress_dump, load_matrix, CompressOptions, CompressOutcome, SparseError,
    Triplet, TripletReader, Triplets,
};

fn write_dump(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}

#[test]
fn test_synthetic_dump_to_matrix() {
    let dir = tempdir().unwrap();
    let dump = dir.path().join("fdt_matrix2.dot");
    let artifact = dir.path().join("fdt_matrix2.csr");
    write_dump(&dump, "1  1  3\n1  1  2\n2  3  1\n");

    let outcome = compress_dump(&dump, &artifact, &CompressOptions::default()).unwrap();
    assert_eq!(
        outcome,
        CompressOutcome::Compressed {
            rows: 2,
            cols: 3,
            nnz: 2
        }
    );
    assert!(!dump.exists(), "dump should be removed after compression");

    let matrix = load_matrix(&artifact).unwrap();
    assert_eq!(matrix.shape(), (2, 3));
    for row in 0..2 {
        for col in 0..3 {
            let expected = match (row, col) {
                (0, 0) => 5.0,
                (1, 2) => 1.0,
                _ => 0.0,
            };
            assert_eq!(matrix.get(row, col).copied().unwrap_or(0.0), expected);
        }
    }
}

#[test]
fn test_second_run_is_noop() {
    let dir = tempdir().unwrap();
    let dump = dir.path().join("fdt_matrix2.dot");
    let artifact = dir.path().join("fdt_matrix2.csr");
    write_dump(&dump, "1 2 4\n3 1 1\n");

    compress_dump(&dump, &artifact, &CompressOptions::default()).unwrap();
    let first_bytes = fs::read(&artifact).unwrap();
    let first_modified = fs::metadata(&artifact).unwrap().modified().unwrap();

    let outcome = compress_dump(&dump, &artifact, &CompressOptions::default()).unwrap();
    assert_eq!(outcome, CompressOutcome::AlreadyCompressed);
    assert_eq!(fs::read(&artifact).unwrap(), first_bytes);
    assert_eq!(fs::metadata(&artifact).unwrap().modified().unwrap(), first_modified);
}

#[test]
fn test_missing_dump_and_artifact() {
    let dir = tempdir().unwrap();
    let outcome = compress_dump(
        dir.path().join("fdt_matrix2.dot"),
        dir.path().join("fdt_matrix2.csr"),
        &CompressOptions::default(),
    )
    .unwrap();
    assert_eq!(outcome, CompressOutcome::MissingInput);
    assert!(!dir.path().join("fdt_matrix2.csr").exists());
}

#[test]
fn test_existing_artifact_keeps_dump_without_recreate() {
    let dir = tempdir().unwrap();
    let dump = dir.path().join("fdt_matrix2.dot");
    let artifact = dir.path().join("fdt_matrix2.csr");
    write_dump(&dump, "1 1 1\n");
    compress_dump(&dump, &artifact, &CompressOptions::default()).unwrap();

    // A new dump appears next to the artifact
    write_dump(&dump, "1 1 1\n2 2 2\n");
    let outcome = compress_dump(&dump, &artifact, &CompressOptions::default()).unwrap();
    assert_eq!(outcome, CompressOutcome::AlreadyCompressed);
    assert!(dump.exists());
    assert_eq!(load_matrix(&artifact).unwrap().shape(), (1, 1));

    let recreate = CompressOptions {
        recreate: true,
        ..CompressOptions::default()
    };
    let outcome = compress_dump(&dump, &artifact, &recreate).unwrap();
    assert_eq!(
        outcome,
        CompressOutcome::Compressed {
            rows: 2,
            cols: 2,
            nnz: 2
        }
    );
    assert!(!dump.exists());
}

#[test]
fn test_parse_failure_leaves_no_artifact() {
    let dir = tempdir().unwrap();
    let dump = dir.path().join("fdt_matrix2.dot");
    let artifact = dir.path().join("fdt_matrix2.csr");
    write_dump(&dump, "1 1 1\n2 x 1\n");

    let err = compress_dump(&dump, &artifact, &CompressOptions::default()).unwrap_err();
    assert!(matches!(err, SparseError::Parse { line: 2, .. }));
    assert!(!artifact.exists());
    assert!(dump.exists(), "dump must survive a failed conversion");
}

#[test]
fn test_explicit_shape_is_stored() {
    let dir = tempdir().unwrap();
    let dump = dir.path().join("fdt_matrix2.dot");
    let artifact = dir.path().join("fdt_matrix2.csr");
    write_dump(&dump, "1 1 1\n");

    let options = CompressOptions {
        shape: Some((10, 20)),
        ..CompressOptions::default()
    };
    compress_dump(&dump, &artifact, &options).unwrap();
    assert_eq!(load_matrix(&artifact).unwrap().shape(), (10, 20));
}

/// Every entry equals the sum of the stream values at that coordinate.
#[test]
fn test_duplicate_accumulation_matches_reference_sums() {
    // Small LCG so the stream is deterministic
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    let mut next = move |bound: u64| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) % bound
    };

    for _ in 0..20 {
        let len = 1 + next(200) as usize;
        let mut text = String::new();
        let mut expected: HashMap<(usize, usize), f64> = HashMap::new();
        for _ in 0..len {
            let row = 1 + next(7);
            let col = 1 + next(11);
            let value = next(50);
            text.push_str(&format!("{}  {}  {}\n", row, col, value));
            *expected.entry(((row - 1) as usize, (col - 1) as usize)).or_insert(0.0) += value as f64;
        }

        let triplets = Triplets::collect_from(TripletReader::new(text.as_bytes())).unwrap();
        let matrix = build_matrix(triplets, Some((7, 11))).unwrap();

        for row in 0..7 {
            for col in 0..11 {
                let actual = matrix.get(row, col).copied().unwrap_or(0.0);
                let wanted = expected.get(&(row, col)).copied().unwrap_or(0.0);
                assert_eq!(actual, wanted, "entry ({}, {})", row, col);
            }
        }
    }
}

#[test]
fn test_triplet_collect_stops_at_first_error() {
    let records = vec![
        Ok(Triplet { row: 0, col: 0, value: 1 }),
        Err(SparseError::Parse {
            line: 2,
            reason: "bad".to_string(),
        }),
        Ok(Triplet { row: 1, col: 1, value: 1 }),
    ];
    assert!(Triplets::collect_from(records).is_err());
}

#[cfg(feature = "npz")]
#[test]
fn test_connectivity_npz_copy() {
    use npyz::npz::NpzArchive;
    use npyz::sparse::Csr;

    let dir = tempdir().unwrap();
    let dump = dir.path().join("fdt_matrix2.dot");
    let artifact = dir.path().join("fdt_matrix2.csr");
    let npz_path = dir.path().join("fdt_matrix2.npz");
    write_dump(&dump, "1  1  3\n1  1  2\n2  3  1\n");

    let options = CompressOptions {
        export_npz: Some(npz_path.clone()),
        ..CompressOptions::default()
    };
    compress_dump(&dump, &artifact, &options).unwrap();
    assert!(!dump.exists());

    let mut npz = NpzArchive::open(&npz_path).unwrap();
    let csr = Csr::<f64>::from_npz(&mut npz).unwrap();
    assert_eq!(csr.shape, [2, 3]);
    assert_eq!(csr.indptr, vec![0, 1, 2]);
    assert_eq!(csr.indices, vec![0, 2]);
    assert_eq!(csr.data, vec![5.0, 1.0]);
}
