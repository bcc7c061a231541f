/*
 * Copyright 2025 Neuraville Inc.
 */

//! Binary sparse matrix artifact format
//!
//! ```text
//! [Header]
//! - Magic: "TRKSP" (5 bytes)
//! - Version: u32 (4 bytes)
//! - Flags: u8 (1 byte) - bit 0: compressed
//! - Uncompressed Size: u64 (8 bytes, original size before compression)
//! - Checksum: u64 (8 bytes, FNV-1a of data)
//! [Data]
//! - Bincode-serialized CSR matrix (optionally LZ4 compressed)
//! ```

use serde::{Deserialize, Serialize};
use sprs::CsMat;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{SparseError, SparseResult};

/// Magic number for artifact files
const MAGIC: &[u8; 5] = b"TRKSP";

/// Current format version (increment when format changes)
pub const FORMAT_VERSION: u32 = 1;

const FLAG_COMPRESSED: u8 = 1;

/// Storage options for artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageOptions {
    /// LZ4-compress the payload (ignored without the `compression` feature)
    pub compression: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self { compression: true }
    }
}

/// On-disk CSR layout, borrowed for writing
#[derive(Serialize)]
struct SparseMatrixFileRef<'a> {
    rows: usize,
    cols: usize,
    indptr: &'a [usize],
    indices: &'a [usize],
    data: &'a [f64],
}

/// On-disk CSR layout, owned for reading
#[derive(Deserialize)]
struct SparseMatrixFile {
    rows: usize,
    cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

/// Sibling path that receives the artifact until it is complete
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Write bytes to `<path>.partial`, sync, then rename over `path`
pub(crate) fn write_atomically(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> SparseResult<()>) -> SparseResult<()> {
    let tmp = partial_path(path);
    let result = (|| -> SparseResult<()> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        write(&mut writer)?;
        let file = writer.into_inner().map_err(|e| SparseError::Io(e.into_error()))?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        SparseError::PartialWrite {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Save a sparse matrix artifact
///
/// CSC input is converted to CSR first. The file appears at `path` only once
/// it has been fully written.
pub fn save_matrix<P: AsRef<Path>>(matrix: &CsMat<f64>, path: P, options: &StorageOptions) -> SparseResult<()> {
    if matrix.is_csc() {
        return save_matrix(&matrix.to_other_storage(), path, options);
    }
    let path = path.as_ref();

    let indptr = matrix.proper_indptr();
    let file = SparseMatrixFileRef {
        rows: matrix.rows(),
        cols: matrix.cols(),
        indptr: &indptr[..],
        indices: matrix.indices(),
        data: matrix.data(),
    };
    let data = bincode::serialize(&file).map_err(|e| SparseError::Serialization(e.to_string()))?;
    let (final_data, flags, uncompressed_size) = compress_payload(data, options)?;
    let checksum = calculate_checksum(&final_data);

    write_atomically(path, |writer| {
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&[flags])?;
        writer.write_all(&uncompressed_size.to_le_bytes())?;
        writer.write_all(&checksum.to_le_bytes())?;
        writer.write_all(&final_data)?;
        Ok(())
    })?;

    debug!(
        target: "tractprint-sparse",
        "Saved {}x{} matrix ({} nnz, {} bytes) to {}",
        matrix.rows(),
        matrix.cols(),
        matrix.nnz(),
        final_data.len(),
        path.display()
    );
    Ok(())
}

#[cfg(feature = "compression")]
fn compress_payload(data: Vec<u8>, options: &StorageOptions) -> SparseResult<(Vec<u8>, u8, u64)> {
    // LZ4 block sizes are i32
    if !options.compression || data.len() > i32::MAX as usize {
        return Ok((data, 0, 0));
    }
    let original_size = data.len() as u64;
    let compressed = lz4::block::compress(&data, None, false)
        .map_err(|e| SparseError::Compression(e.to_string()))?;
    Ok((compressed, FLAG_COMPRESSED, original_size))
}

#[cfg(not(feature = "compression"))]
fn compress_payload(data: Vec<u8>, _options: &StorageOptions) -> SparseResult<(Vec<u8>, u8, u64)> {
    Ok((data, 0, 0))
}

/// Load a sparse matrix artifact
///
/// Verifies magic, version, checksum and CSR structure.
pub fn load_matrix<P: AsRef<Path>>(path: P) -> SparseResult<CsMat<f64>> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|source| SparseError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;

    let mut magic = [0u8; 5];
    file.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(SparseError::InvalidMagic(magic));
    }

    let mut version_bytes = [0u8; 4];
    file.read_exact(&mut version_bytes)?;
    let version = u32::from_le_bytes(version_bytes);
    if version != FORMAT_VERSION {
        return Err(SparseError::VersionMismatch {
            file_version: version,
            expected_version: FORMAT_VERSION,
        });
    }

    let mut flags = [0u8; 1];
    file.read_exact(&mut flags)?;
    let is_compressed = (flags[0] & FLAG_COMPRESSED) != 0;

    let mut size_bytes = [0u8; 8];
    file.read_exact(&mut size_bytes)?;
    let uncompressed_size = u64::from_le_bytes(size_bytes);

    let mut checksum_bytes = [0u8; 8];
    file.read_exact(&mut checksum_bytes)?;
    let expected_checksum = u64::from_le_bytes(checksum_bytes);

    let mut stored = Vec::new();
    file.read_to_end(&mut stored)?;

    if calculate_checksum(&stored) != expected_checksum {
        return Err(SparseError::ChecksumMismatch);
    }

    let data = if is_compressed {
        decompress_payload(&stored, uncompressed_size)?
    } else {
        stored
    };

    let file: SparseMatrixFile =
        bincode::deserialize(&data).map_err(|e| SparseError::Deserialization(e.to_string()))?;

    CsMat::try_new((file.rows, file.cols), file.indptr, file.indices, file.data)
        .map_err(|(_, _, _, e)| SparseError::Structure(e.to_string()))
}

#[cfg(feature = "compression")]
fn decompress_payload(stored: &[u8], uncompressed_size: u64) -> SparseResult<Vec<u8>> {
    let size = i32::try_from(uncompressed_size)
        .map_err(|_| SparseError::Compression(format!("invalid uncompressed size {}", uncompressed_size)))?;
    lz4::block::decompress(stored, Some(size))
        .map_err(|e| SparseError::Compression(format!("Decompression failed: {}", e)))
}

#[cfg(not(feature = "compression"))]
fn decompress_payload(_stored: &[u8], _uncompressed_size: u64) -> SparseResult<Vec<u8>> {
    Err(SparseError::Compression(
        "File is compressed but compression feature is not enabled".to_string(),
    ))
}

/// FNV-1a over the stored payload
fn calculate_checksum(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
