//src/kmer_vocab.rs

use ahash::AHashMap;
use std::sync::OnceLock;

use crate::error::PipelineError;

/// Nucleotide alphabet in enumeration order.
pub const ALPHABET: [u8; 4] = *b"ACGT";

/// The k-mer lengths that make up the default feature space.
pub const DEFAULT_KMER_SIZES: [usize; 3] = [3, 4, 5];

/// Largest k accepted by `KmerVocabulary::with_sizes` (4^8 = 65,536 columns).
pub const MAX_K: usize = 8;

/// One block of the vocabulary: all 4^k strings of length `k`,
/// stored contiguously starting at column `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerGroup {
    pub k: usize,
    pub offset: usize,
}

impl KmerGroup {
    /// Number of columns in this group (4^k).
    pub fn width(&self) -> usize {
        1 << (2 * self.k)
    }
}

/// The ordered, deduplicated set of k-mers used as feature-matrix columns.
///
/// Within a group the keys follow the Cartesian product over `ACGT`, so the
/// column of a k-mer inside its group is exactly its 2-bit code
/// (A=0, C=1, G=2, T=3, most significant position first). The counter relies
/// on that to avoid string lookups.
#[derive(Debug, Clone)]
pub struct KmerVocabulary {
    keys: Vec<String>,
    groups: Vec<KmerGroup>,
    index: AHashMap<String, usize>,
}

static DEFAULT_VOCABULARY: OnceLock<KmerVocabulary> = OnceLock::new();

/// The process-wide 3/4/5-mer vocabulary (1,344 keys). Built on first use and
/// never mutated afterwards, so it can be shared freely between threads.
pub fn default_vocabulary() -> &'static KmerVocabulary {
    DEFAULT_VOCABULARY.get_or_init(|| KmerVocabulary::build(&DEFAULT_KMER_SIZES))
}

impl KmerVocabulary {
    /// Builds a vocabulary for an arbitrary combination of k-mer lengths,
    /// e.g. `[3, 4]` or `[4, 5]`. Lengths are sorted and deduplicated.
    pub fn with_sizes(sizes: &[usize]) -> Result<Self, PipelineError> {
        if let Some(&bad) = sizes.iter().find(|&&k| k == 0 || k > MAX_K) {
            return Err(PipelineError::InvalidKmerSize(bad));
        }
        Ok(Self::build(sizes))
    }

    fn build(sizes: &[usize]) -> Self {
        let mut sizes = sizes.to_vec();
        sizes.sort_unstable();
        sizes.dedup();

        let total: usize = sizes.iter().map(|k| 1usize << (2 * k)).sum();
        let mut keys = Vec::with_capacity(total);
        let mut groups = Vec::with_capacity(sizes.len());

        for &k in &sizes {
            groups.push(KmerGroup { k, offset: keys.len() });
            for code in 0..(1u64 << (2 * k)) {
                keys.push(decode_kmer_2bit(code, k));
            }
        }

        let index = keys
            .iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), i))
            .collect();

        log::debug!(
            "Built k-mer vocabulary: k={:?}, {} keys",
            sizes,
            keys.len()
        );

        Self { keys, groups, index }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Column labels, in matrix column order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn groups(&self) -> &[KmerGroup] {
        &self.groups
    }

    /// Column index of `kmer`, if it is part of the vocabulary.
    pub fn index_of(&self, kmer: &str) -> Option<usize> {
        self.index.get(kmer).copied()
    }
}

/// Turns a 2-bit packed k-mer back into its string form.
fn decode_kmer_2bit(code: u64, k: usize) -> String {
    (0..k)
        .rev()
        .map(|pos| ALPHABET[((code >> (2 * pos)) & 3) as usize] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;

    #[test]
    fn test_default_vocabulary_completeness() {
        let vocab = default_vocabulary();
        assert_eq!(vocab.len(), 1344);

        let unique: AHashSet<&String> = vocab.keys().iter().collect();
        assert_eq!(unique.len(), 1344);

        let count_len = |n: usize| vocab.keys().iter().filter(|k| k.len() == n).count();
        assert_eq!(count_len(3), 64);
        assert_eq!(count_len(4), 256);
        assert_eq!(count_len(5), 1024);
    }

    #[test]
    fn test_enumeration_order() {
        let vocab = default_vocabulary();
        let keys = vocab.keys();
        assert_eq!(keys[0], "AAA");
        assert_eq!(keys[1], "AAC");
        assert_eq!(keys[4], "ACA");
        assert_eq!(keys[63], "TTT");
        assert_eq!(keys[64], "AAAA");
        assert_eq!(keys[319], "TTTT");
        assert_eq!(keys[320], "AAAAA");
        assert_eq!(keys[1343], "TTTTT");

        // lexicographic inside each group
        for g in vocab.groups() {
            let block = &keys[g.offset..g.offset + g.width()];
            assert!(block.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_default_vocabulary_is_shared() {
        let a = default_vocabulary() as *const KmerVocabulary;
        let b = default_vocabulary() as *const KmerVocabulary;
        assert_eq!(a, b);
    }

    #[test]
    fn test_index_of_matches_code() {
        let vocab = default_vocabulary();
        assert_eq!(vocab.index_of("AAA"), Some(0));
        // ACG = 0b00_01_10 = 6
        assert_eq!(vocab.index_of("ACG"), Some(6));
        assert_eq!(vocab.index_of("ACGT"), Some(64 + 0b00_01_10_11));
        assert_eq!(vocab.index_of("AC"), None);
        assert_eq!(vocab.index_of("ACGN"), None);
    }

    #[test]
    fn test_with_sizes() {
        let vocab = KmerVocabulary::with_sizes(&[4, 3, 4]).unwrap();
        assert_eq!(vocab.len(), 64 + 256);
        assert_eq!(
            vocab.groups(),
            &[KmerGroup { k: 3, offset: 0 }, KmerGroup { k: 4, offset: 64 }]
        );

        assert!(matches!(
            KmerVocabulary::with_sizes(&[0]),
            Err(PipelineError::InvalidKmerSize(0))
        ));
        assert!(matches!(
            KmerVocabulary::with_sizes(&[3, 9]),
            Err(PipelineError::InvalidKmerSize(9))
        ));
    }
}
