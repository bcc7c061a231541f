/*
 * Copyright 2025 Neuraville Inc.
 */

//! Streaming reader for coordinate-list connectivity dumps
//!
//! One record per line: `row col value`, 1-indexed, separated by whitespace
//! (the tractography tool writes two spaces). Rows and columns are converted to
//! 0-indexed on read.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use tracing::debug;

use crate::{SparseError, SparseResult};

/// Minimum growth step for the triplet buffers
const MIN_RESERVE: usize = 4096;

/// One 0-indexed connectivity record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triplet {
    pub row: usize,
    pub col: usize,
    pub value: u64,
}

/// Line-by-line triplet parser over any buffered reader
pub struct TripletReader<R> {
    reader: R,
    line: String,
    line_number: usize,
}

impl TripletReader<BufReader<File>> {
    /// Open a dump file
    pub fn open<P: AsRef<Path>>(path: P) -> SparseResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SparseError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::with_capacity(1 << 20, file)))
    }
}

impl<R: BufRead> TripletReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_number: 0,
        }
    }

    /// Number of lines consumed so far
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<R: BufRead> Iterator for TripletReader<R> {
    type Item = SparseResult<Triplet>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_number += 1;
                    if self.line.trim().is_empty() {
                        continue;
                    }
                    return Some(parse_line(&self.line, self.line_number));
                }
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    return Some(Err(SparseError::Parse {
                        line: self.line_number + 1,
                        reason: "line is not valid UTF-8".to_string(),
                    }));
                }
                Err(e) => return Some(Err(SparseError::Io(e))),
            }
        }
    }
}

/// Parse one `row col value` line (1-indexed row/col)
pub fn parse_line(line: &str, line_number: usize) -> SparseResult<Triplet> {
    let mut fields = line.split_whitespace();
    let (row, col, value) = match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(row), Some(col), Some(value), None) => (row, col, value),
        _ => {
            return Err(SparseError::Parse {
                line: line_number,
                reason: format!(
                    "expected 3 fields, found {}",
                    line.split_whitespace().count()
                ),
            })
        }
    };

    Ok(Triplet {
        row: parse_index(row, "row", line_number)?,
        col: parse_index(col, "column", line_number)?,
        value: value.parse::<u64>().map_err(|_| SparseError::Parse {
            line: line_number,
            reason: format!("value '{}' is not a non-negative integer", value),
        })?,
    })
}

fn parse_index(field: &str, what: &str, line_number: usize) -> SparseResult<usize> {
    match field.parse::<usize>() {
        Ok(index) if index >= 1 => Ok(index - 1),
        Ok(_) => Err(SparseError::Parse {
            line: line_number,
            reason: format!("{} index 0 in 1-indexed input", what),
        }),
        Err(_) => Err(SparseError::Parse {
            line: line_number,
            reason: format!("{} index '{}' is not an integer", what, field),
        }),
    }
}

/// Parallel row / column / value sequences, 0-indexed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triplets {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub values: Vec<f64>,
    max_row: Option<usize>,
    max_col: Option<usize>,
}

impl Triplets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a record, growing the buffers fallibly
    ///
    /// # Errors
    /// `OutOfMemory` when the allocator refuses to grow any of the buffers.
    pub fn push(&mut self, triplet: Triplet) -> SparseResult<()> {
        if self.rows.len() == self.rows.capacity() {
            let additional = self.rows.len().max(MIN_RESERVE);
            let entries = self.rows.len();
            self.rows
                .try_reserve(additional)
                .and_then(|_| self.cols.try_reserve(additional))
                .and_then(|_| self.values.try_reserve(additional))
                .map_err(|_| SparseError::OutOfMemory { entries })?;
        }

        self.rows.push(triplet.row);
        self.cols.push(triplet.col);
        self.values.push(triplet.value as f64);
        self.max_row = Some(self.max_row.map_or(triplet.row, |m| m.max(triplet.row)));
        self.max_col = Some(self.max_col.map_or(triplet.col, |m| m.max(triplet.col)));
        Ok(())
    }

    /// `(max_row + 1, max_col + 1)`, or `None` for an empty stream
    pub fn inferred_shape(&self) -> Option<(usize, usize)> {
        Some((self.max_row? + 1, self.max_col? + 1))
    }

    /// Collect a triplet stream, stopping at the first error
    pub fn collect_from<I>(iter: I) -> SparseResult<Self>
    where
        I: IntoIterator<Item = SparseResult<Triplet>>,
    {
        let mut triplets = Triplets::new();
        for triplet in iter {
            triplets.push(triplet?)?;
        }
        Ok(triplets)
    }
}

/// Read a whole dump file into parallel sequences
///
/// # Errors
/// `FileAccess` when the dump cannot be opened, `Parse` for a malformed line,
/// and `OutOfMemory` when the triplet buffers cannot grow.
///
/// Only the triplet buffers are grown fallibly. Converting them to CSR in
/// [`build_matrix`](crate::build_matrix) allocates the compressed arrays
/// through `sprs`, which aborts rather than reporting an allocation failure.
pub fn read_triplets<P: AsRef<Path>>(path: P) -> SparseResult<Triplets> {
    let path = path.as_ref();
    let reader = TripletReader::open(path)?;
    let triplets = Triplets::collect_from(reader)?;
    debug!(
        target: "tractprint-sparse",
        "Finished loading {}: {} records",
        path.display(),
        triplets.len()
    );
    Ok(triplets)
}
