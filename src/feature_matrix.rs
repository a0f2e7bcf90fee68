//src/feature_matrix.rs

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::PipelineError;
use crate::kmer_count::RawCountRow;
use crate::normalize::FrequencyRow;

/// A table with one row per sequence and one column per vocabulary k-mer,
/// plus the identifier of each row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix<'v, T> {
    columns: &'v [String],
    ids: Vec<String>,
    rows: Vec<Vec<T>>,
}

impl<'v, T> FeatureMatrix<'v, T> {
    /// `ids[i]` labels `rows[i]`; every row must be as wide as `columns`.
    pub fn new(
        columns: &'v [String],
        ids: Vec<String>,
        rows: Vec<Vec<T>>,
    ) -> Result<Self, PipelineError> {
        if ids.len() != rows.len() {
            return Err(PipelineError::RowCount {
                ids: ids.len(),
                rows: rows.len(),
            });
        }
        if let Some(row) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(PipelineError::RowWidth {
                row,
                expected: columns.len(),
                found: rows[row].len(),
            });
        }
        Ok(Self { columns, ids, rows })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &'v [String] {
        self.columns
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// The numeric part of the table, without the identifier column.
    pub fn rows(&self) -> &[Vec<T>] {
        &self.rows
    }
}

impl<T: Display> FeatureMatrix<'_, T> {
    /// Writes the table as TSV: a header of `seq_id` and the k-mer columns,
    /// then one line per row in row order.
    pub fn write_tsv<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "seq_id")?;
        for col in self.columns {
            write!(out, "\t{}", col)?;
        }
        writeln!(out)?;

        for (id, row) in self.ids.iter().zip(&self.rows) {
            write!(out, "{}", id)?;
            for v in row {
                write!(out, "\t{}", v)?;
            }
            writeln!(out)?;
        }
        out.flush()
    }

    pub fn write_tsv_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let f = File::create(path)?;
        self.write_tsv(BufWriter::new(f))
    }
}

/// Pairs identifiers with their frequency and raw-count rows, producing the
/// table used for inference and the one kept for diagnostics. Row order is
/// the order of `ids`.
pub fn assemble<'v>(
    columns: &'v [String],
    ids: Vec<String>,
    frequencies: Vec<FrequencyRow>,
    raw_counts: Vec<RawCountRow>,
) -> Result<(FeatureMatrix<'v, f64>, FeatureMatrix<'v, u32>), PipelineError> {
    log::debug!(
        "Assembled feature tables: {} rows x {} columns",
        ids.len(),
        columns.len()
    );
    let freq = FeatureMatrix::new(columns, ids.clone(), frequencies)?;
    let raw = FeatureMatrix::new(columns, ids, raw_counts)?;
    Ok((freq, raw))
}
