//src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Problems with a single input record. These never abort a batch: the
/// record is dropped and reported alongside the predictions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing sequence identifier")]
    MissingIdentifier,
    #[error("missing sequence field")]
    MissingSequence,
    #[error("duplicate sequence identifier {0:?}")]
    DuplicateIdentifier(String),
    #[error("sequence has no countable k-mers")]
    ZeroKmerCount,
}

/// Failure reported by a classifier implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ClassifierError(pub String);

impl ClassifierError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Errors that abort the whole batch.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("feature-schema mismatch: classifier expects {expected} columns, matrix has {found}")]
    SchemaMismatch { expected: usize, found: usize },

    #[error("feature-schema mismatch at column {position}: classifier expects {expected:?}, matrix has {found:?}")]
    ColumnOrderMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("inference failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("classifier returned {found} predictions for {expected} rows")]
    PredictionLength { expected: usize, found: usize },

    #[error("classifier returned label {label} for row {row}; expected 0 or 1")]
    InvalidLabel { row: usize, label: u8 },

    #[error("classifier returned probability {probability} for row {row}; expected a value in [0, 1]")]
    InvalidProbability { row: usize, probability: f64 },

    #[error("staging tables under {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("feature table has {ids} identifiers for {rows} rows")]
    RowCount { ids: usize, rows: usize },

    #[error("feature row {row} has {found} values, table has {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("model has {names} feature names but {weights} weights")]
    ModelShape { names: usize, weights: usize },

    #[error("unsupported k-mer length {0}; expected 1..={max}", max = crate::kmer_vocab::MAX_K)]
    InvalidKmerSize(usize),

    #[error("model file line {line}: {msg}")]
    ModelFormat { line: usize, msg: String },
}
