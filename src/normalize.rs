//src/normalize.rs

use crate::error::RecordError;
use crate::kmer_count::row_total;

/// K-mer frequencies for one sequence, aligned with the vocabulary columns.
pub type FrequencyRow = Vec<f64>;

/// What to do with a sequence that has no countable k-mers (too short, empty,
/// or made only of bases outside `ACGT`), where `count / total` is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroRowPolicy {
    /// Emit an all-zero frequency row and keep the record.
    #[default]
    ZeroFill,
    /// Drop the record from the batch with `RecordError::ZeroKmerCount`.
    Reject,
}

/// Divides each count by the row total. Non-zero rows sum to 1.0.
pub fn normalize_row(row: &[u32], policy: ZeroRowPolicy) -> Result<FrequencyRow, RecordError> {
    let total = row_total(row);
    if total == 0 {
        return match policy {
            ZeroRowPolicy::ZeroFill => Ok(vec![0.0; row.len()]),
            ZeroRowPolicy::Reject => Err(RecordError::ZeroKmerCount),
        };
    }
    let total = total as f64;
    Ok(row.iter().map(|&c| c as f64 / total).collect())
}
