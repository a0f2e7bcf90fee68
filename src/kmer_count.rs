//src/kmer_count.rs

use rayon::prelude::*;

use crate::kmer_vocab::KmerVocabulary;
use crate::types::SequenceRecord;

/// Raw k-mer counts for one sequence, one entry per vocabulary column.
pub type RawCountRow = Vec<u32>;

/// 2-bit code of an uppercase nucleotide. Anything else (lowercase, `N`, `U`,
/// gaps) is not part of the alphabet and never matches a vocabulary key.
#[inline]
fn encode_base(b: u8) -> Option<u64> {
    match b {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Counts every vocabulary k-mer in `sequence`, overlapping occurrences included.
///
/// One rolling pass per k-mer length: the window's 2-bit code is the column
/// offset inside that length's group, so no key lookups are needed. A base
/// outside `ACGT` restarts the window, which gives the same result as a literal
/// substring count of each key.
pub fn count_kmers(sequence: &str, vocab: &KmerVocabulary) -> RawCountRow {
    let mut row = vec![0u32; vocab.len()];
    let bytes = sequence.as_bytes();

    for group in vocab.groups() {
        let k = group.k;
        if bytes.len() < k {
            continue;
        }
        let mask = (1u64 << (2 * k)) - 1;
        let mut code = 0u64;
        let mut run = 0usize;

        for &b in bytes {
            match encode_base(b) {
                Some(bits) => {
                    code = ((code << 2) | bits) & mask;
                    run += 1;
                }
                None => {
                    code = 0;
                    run = 0;
                }
            }
            if run >= k {
                row[group.offset + code as usize] += 1;
            }
        }
    }
    row
}

/// Counts k-mers for a batch of records. Row `i` belongs to `records[i]`,
/// whether or not the work is spread over the rayon pool.
pub fn count_batch(
    records: &[SequenceRecord],
    vocab: &KmerVocabulary,
    parallel: bool,
) -> Vec<RawCountRow> {
    if parallel {
        records
            .par_iter()
            .map(|rec| count_kmers(&rec.sequence, vocab))
            .collect()
    } else {
        records
            .iter()
            .map(|rec| count_kmers(&rec.sequence, vocab))
            .collect()
    }
}

/// Total number of counted k-mers in a row.
pub fn row_total(row: &[u32]) -> u64 {
    row.iter().map(|&c| c as u64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer_vocab::{default_vocabulary, KmerVocabulary};

    /// Literal overlapping substring count, used as the reference.
    fn naive_count(seq: &str, key: &str) -> u32 {
        if key.len() > seq.len() {
            return 0;
        }
        (0..=seq.len() - key.len())
            .filter(|&i| seq.is_char_boundary(i) && seq[i..].starts_with(key))
            .count() as u32
    }

    fn count_of(row: &[u32], vocab: &KmerVocabulary, key: &str) -> u32 {
        row[vocab.index_of(key).unwrap()]
    }

    #[test]
    fn test_overlapping_counts() {
        let vocab = default_vocabulary();
        let row = count_kmers("AAAAAA", vocab);
        // 6 bases: 4 AAA, 3 AAAA, 2 AAAAA
        assert_eq!(count_of(&row, vocab, "AAA"), 4);
        assert_eq!(count_of(&row, vocab, "AAAA"), 3);
        assert_eq!(count_of(&row, vocab, "AAAAA"), 2);
        assert_eq!(row_total(&row), 9);
    }

    #[test]
    fn test_acgt_single_hits() {
        let vocab = default_vocabulary();
        let row = count_kmers("ACGT", vocab);
        assert_eq!(count_of(&row, vocab, "ACG"), 1);
        assert_eq!(count_of(&row, vocab, "CGT"), 1);
        assert_eq!(count_of(&row, vocab, "ACGT"), 1);
        assert_eq!(row_total(&row), 3);
    }

    #[test]
    fn test_two_mer_overlap() {
        // "AA" in "AAAA" is 3, not 2
        let vocab = KmerVocabulary::with_sizes(&[2]).unwrap();
        let row = count_kmers("AAAA", &vocab);
        assert_eq!(count_of(&row, &vocab, "AA"), 3);
    }

    #[test]
    fn test_short_and_empty_sequences() {
        let vocab = default_vocabulary();
        assert_eq!(row_total(&count_kmers("", vocab)), 0);
        assert_eq!(row_total(&count_kmers("AC", vocab)), 0);

        // 4 bases: only the 3- and 4-mer groups see anything
        let row = count_kmers("GGGG", vocab);
        assert_eq!(count_of(&row, vocab, "GGG"), 2);
        assert_eq!(count_of(&row, vocab, "GGGG"), 1);
        assert_eq!(row[320..].iter().sum::<u32>(), 0);
    }

    #[test]
    fn test_invalid_bases_break_windows() {
        let vocab = default_vocabulary();
        let row = count_kmers("ACGNACG", vocab);
        assert_eq!(count_of(&row, vocab, "ACG"), 2);
        assert_eq!(count_of(&row, vocab, "CGA"), 0);
        assert_eq!(row_total(&row), 2);

        // lowercase is not counted
        assert_eq!(row_total(&count_kmers("acgtacgt", vocab)), 0);
    }

    #[test]
    fn test_matches_literal_substring_count() {
        let vocab = default_vocabulary();
        let seqs = [
            "ACGTACGTTTGACCANNGGTACCATTTTTAGC",
            "GGGGGGGGCGCGCGCGATATATAT",
            "TTAGGGTTAGGGNTTAGGG-ACCU",
        ];
        for seq in seqs {
            let row = count_kmers(seq, vocab);
            for (i, key) in vocab.keys().iter().enumerate() {
                assert_eq!(row[i], naive_count(seq, key), "key {key} in {seq}");
            }
        }
    }

    #[test]
    fn test_count_batch_keeps_order() {
        let vocab = default_vocabulary();
        let records: Vec<SequenceRecord> = (0..50)
            .map(|i| SequenceRecord::new(format!("s{i}"), "ACGT".repeat(i + 1)))
            .collect();

        let serial = count_batch(&records, vocab, false);
        let parallel = count_batch(&records, vocab, true);
        assert_eq!(serial, parallel);
        for (i, row) in serial.iter().enumerate() {
            assert_eq!(count_of(row, vocab, "ACGT"), (i + 1) as u32);
        }
    }
}
