//src/types.rs

use std::fmt;

use crate::error::RecordError;

/// One input sequence: an identifier and its (uppercased) nucleotide string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub id: String,
    pub sequence: String,
}

impl SequenceRecord {
    pub fn new(id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
        }
    }
}

/// A `SequenceRecord` annotated with the classifier's output.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub id: String,
    pub sequence: String,
    pub predicted_label: u8,
    /// Probability of the positive class, in [0, 1].
    pub predicted_probability: f64,
    /// `2 * predicted_probability - 1`, in [-1, 1].
    pub signed_score: f64,
}

impl PredictionRecord {
    pub fn from_record(record: SequenceRecord, predicted_label: u8, predicted_probability: f64) -> Self {
        Self {
            id: record.id,
            sequence: record.sequence,
            predicted_label,
            predicted_probability,
            signed_score: signed_score(predicted_probability),
        }
    }
}

/// Maps a positive-class probability onto [-1, 1].
#[inline]
pub fn signed_score(probability: f64) -> f64 {
    2.0 * probability - 1.0
}

/// A record that was dropped from the batch, with the reason why.
/// `line` is the 1-based input line (or FASTA header line) when known.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub line: Option<usize>,
    pub id: Option<String>,
    pub reason: RecordError,
}

impl fmt::Display for RejectedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.line, &self.id) {
            (Some(line), Some(id)) => write!(f, "line {line} ({id}): {}", self.reason),
            (Some(line), None) => write!(f, "line {line}: {}", self.reason),
            (None, Some(id)) => write!(f, "{id}: {}", self.reason),
            (None, None) => write!(f, "{}", self.reason),
        }
    }
}
