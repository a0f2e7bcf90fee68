// src/lib.rs
pub mod types;
pub mod error;
pub mod kmer_vocab;
pub mod kmer_count;
pub mod normalize;
pub mod feature_matrix;
pub mod classifier;
pub mod linear_model;
pub mod staging;
pub mod sequence_io;

use std::fmt::Write as FmtWrite;

use crate::classifier::{annotate, infer, Classifier};
use crate::error::PipelineError;
use crate::feature_matrix::{assemble, FeatureMatrix};
use crate::kmer_count::count_batch;
use crate::kmer_vocab::{default_vocabulary, KmerVocabulary};
use crate::normalize::{normalize_row, ZeroRowPolicy};
use crate::sequence_io::{records_from_pairs, ParsedBatch};
use crate::staging::{FeatureSink, StagedTables};
use crate::types::{PredictionRecord, RejectedRecord, SequenceRecord};

/// Knobs for a pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// How sequences without any countable k-mer are handled.
    pub zero_row_policy: ZeroRowPolicy,
    /// Count k-mers on the rayon pool. Output order is the same either way.
    pub parallel: bool,
}

/// Feature tables for the records that survived counting and normalization.
pub struct FeatureTables<'v> {
    /// Surviving records, in input order; row `i` of both tables is `records[i]`.
    pub records: Vec<SequenceRecord>,
    pub frequencies: FeatureMatrix<'v, f64>,
    pub raw_counts: FeatureMatrix<'v, u32>,
    pub rejected: Vec<RejectedRecord>,
}

/// Everything a batch produced.
#[derive(Debug, Clone, Default)]
pub struct PredictionResults {
    /// One entry per accepted record, in input order.
    pub predictions: Vec<PredictionRecord>,
    /// Records dropped during parsing or normalization.
    pub rejected: Vec<RejectedRecord>,
    /// Where the feature tables were written, if a sink was given and keeps
    /// them. Sinks that clean up after inference, like `TempStaging`, leave
    /// this `None` since their files are already gone.
    pub staged: Option<StagedTables>,
}

impl PredictionResults {
    /// Predictions as TSV, generated on demand.
    pub fn get_prediction_output(&self) -> String {
        let mut output = String::new();
        output.push_str("seq_id\tsequence\tpred_label\tpred_prob\tlight_score\n");
        for p in &self.predictions {
            let _ = writeln!(
                output,
                "{}\t{}\t{}\t{}\t{}",
                p.id, p.sequence, p.predicted_label, p.predicted_probability, p.signed_score
            );
        }
        output
    }

    /// One line per rejected record, empty if nothing was rejected.
    pub fn get_rejected_text(&self) -> String {
        let mut output = String::new();
        for r in &self.rejected {
            let _ = writeln!(output, "{}", r);
        }
        output
    }
}

/// Counts, normalizes and assembles the feature tables for `records`.
///
/// Records whose row cannot be normalized under the configured policy are
/// moved to `rejected`; the rest keep their relative order.
pub fn extract_features<'v>(
    records: Vec<SequenceRecord>,
    vocab: &'v KmerVocabulary,
    config: &PipelineConfig,
) -> Result<FeatureTables<'v>, PipelineError> {
    let raw_rows = count_batch(&records, vocab, config.parallel);

    let mut kept = Vec::with_capacity(records.len());
    let mut ids = Vec::with_capacity(records.len());
    let mut frequencies = Vec::with_capacity(records.len());
    let mut raw_counts = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();

    for (record, raw) in records.into_iter().zip(raw_rows) {
        match normalize_row(&raw, config.zero_row_policy) {
            Ok(freq) => {
                if freq.iter().all(|&f| f == 0.0) {
                    log::warn!("{} has no countable k-mers; using an all-zero row", record.id);
                }
                ids.push(record.id.clone());
                frequencies.push(freq);
                raw_counts.push(raw);
                kept.push(record);
            }
            Err(reason) => {
                log::warn!("Rejecting {}: {}", record.id, reason);
                rejected.push(RejectedRecord {
                    line: None,
                    id: Some(record.id),
                    reason,
                });
            }
        }
    }

    let (frequencies, raw_counts) = assemble(vocab.keys(), ids, frequencies, raw_counts)?;
    Ok(FeatureTables {
        records: kept,
        frequencies,
        raw_counts,
        rejected,
    })
}

/// Runs a parsed batch through the whole pipeline:
/// count, normalize, assemble, optionally stage, infer.
///
/// A sink, if given, is always released once inference is over, including
/// when inference fails. A release failure after a successful inference is
/// logged and the predictions are still returned.
pub fn predict_batch<C: Classifier + ?Sized>(
    batch: ParsedBatch,
    vocab: &KmerVocabulary,
    classifier: &C,
    sink: Option<&mut dyn FeatureSink>,
    config: &PipelineConfig,
) -> Result<PredictionResults, PipelineError> {
    let ParsedBatch { records, mut rejected } = batch;
    let tables = extract_features(records, vocab, config)?;
    rejected.extend(tables.rejected);

    log::info!(
        "Feature matrix: {} rows x {} columns ({} records rejected)",
        tables.frequencies.n_rows(),
        tables.frequencies.n_cols(),
        rejected.len()
    );

    let (predictions, staged) = match sink {
        Some(sink) => {
            let keeps_tables = sink.keeps_tables();
            let outcome = sink
                .stage(&tables.frequencies, &tables.raw_counts)
                .and_then(|staged| {
                    let predictions = infer(classifier, &tables.frequencies)?;
                    Ok((predictions, keeps_tables.then_some(staged)))
                });
            let released = sink.release();
            match (outcome, released) {
                (Ok(out), Ok(())) => out,
                (Ok(out), Err(e)) => {
                    log::warn!("Could not clean up staged tables: {e}");
                    out
                }
                (Err(e), released) => {
                    if let Err(release_err) = released {
                        log::warn!("Could not clean up staged tables: {release_err}");
                    }
                    return Err(e);
                }
            }
        }
        None => (infer(classifier, &tables.frequencies)?, None),
    };

    let predictions = annotate(tables.records, &predictions);
    log::info!("Scored {} sequences", predictions.len());

    Ok(PredictionResults {
        predictions,
        rejected,
        staged,
    })
}

/// Scores `(identifier, sequence)` pairs against `classifier` using the
/// 3/4/5-mer vocabulary. Malformed pairs are rejected individually; schema and
/// classifier failures abort the batch.
pub fn predict_localization<I, S, T, C>(
    pairs: I,
    classifier: &C,
    sink: Option<&mut dyn FeatureSink>,
    config: &PipelineConfig,
) -> Result<PredictionResults, PipelineError>
where
    I: IntoIterator<Item = (S, T)>,
    S: AsRef<str>,
    T: AsRef<str>,
    C: Classifier + ?Sized,
{
    let batch = records_from_pairs(pairs, false);
    predict_batch(batch, default_vocabulary(), classifier, sink, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClassifierError, RecordError};
    use std::path::PathBuf;

    /// Probability is the frequency of the "AAA" column.
    struct AaaScorer;

    impl Classifier for AaaScorer {
        fn n_features(&self) -> usize {
            1344
        }
        fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<u8>, ClassifierError> {
            Ok(features.iter().map(|r| u8::from(r[0] >= 0.5)).collect())
        }
        fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ClassifierError> {
            Ok(features.iter().map(|r| r[0]).collect())
        }
    }

    #[test]
    fn test_zero_rows_filled_by_default() {
        let results = predict_localization(
            vec![("short", "AC"), ("polyA", "AAA")],
            &AaaScorer,
            None,
            &PipelineConfig::default(),
        )
        .unwrap();
        assert!(results.rejected.is_empty());
        assert_eq!(results.predictions.len(), 2);
        assert_eq!(results.predictions[0].predicted_probability, 0.0);
        assert_eq!(results.predictions[0].signed_score, -1.0);
        assert_eq!(results.predictions[1].predicted_probability, 1.0);
        assert_eq!(results.predictions[1].predicted_label, 1);
    }

    #[test]
    fn test_zero_rows_rejected_when_configured() {
        let config = PipelineConfig {
            zero_row_policy: ZeroRowPolicy::Reject,
            ..Default::default()
        };
        let results = predict_localization(
            vec![("short", "AC"), ("ok", "ACGT"), ("", "ACGT"), ("nnn", "NNNNNN")],
            &AaaScorer,
            None,
            &config,
        )
        .unwrap();

        let ids: Vec<&str> = results.predictions.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);

        let reasons: Vec<&RecordError> = results.rejected.iter().map(|r| &r.reason).collect();
        assert_eq!(
            reasons,
            vec![
                &RecordError::MissingIdentifier,
                &RecordError::ZeroKmerCount,
                &RecordError::ZeroKmerCount,
            ]
        );
        assert_eq!(results.rejected[1].id.as_deref(), Some("short"));
        assert_eq!(
            results.get_rejected_text(),
            "missing sequence identifier\nshort: sequence has no countable k-mers\nnnn: sequence has no countable k-mers\n"
        );
    }

    #[test]
    fn test_extract_features_shapes() {
        let vocab = default_vocabulary();
        let records = vec![
            SequenceRecord::new("a", "ACGTACGT"),
            SequenceRecord::new("b", "TTTT"),
        ];
        let tables = extract_features(records, vocab, &PipelineConfig::default()).unwrap();
        assert_eq!(tables.frequencies.n_rows(), 2);
        assert_eq!(tables.frequencies.n_cols(), 1344);
        assert_eq!(tables.raw_counts.ids(), &["a", "b"]);
        assert_eq!(tables.raw_counts.rows()[1][63], 2); // TTT
        assert_eq!(tables.records[1].id, "b");
    }

    #[test]
    fn test_inner_whitespace_not_removed() {
        let vocab = default_vocabulary();
        let batch = records_from_pairs(vec![("x", "acg t")], false);
        assert_eq!(batch.records[0].sequence, "ACG T");

        let tables = extract_features(batch.records, vocab, &PipelineConfig::default()).unwrap();
        let acgt = vocab.index_of("ACGT").unwrap();
        let acg = vocab.index_of("ACG").unwrap();
        assert_eq!(tables.raw_counts.rows()[0][acgt], 0);
        assert_eq!(tables.raw_counts.rows()[0][acg], 1);
    }

    /// Writes nothing and fails to clean up.
    struct StuckSink;

    impl FeatureSink for StuckSink {
        fn stage(
            &mut self,
            _: &FeatureMatrix<'_, f64>,
            _: &FeatureMatrix<'_, u32>,
        ) -> Result<StagedTables, PipelineError> {
            Ok(StagedTables {
                frequency_path: PathBuf::from("stuck_freq.tsv"),
                raw_count_path: PathBuf::from("stuck_rawcount.tsv"),
            })
        }

        fn release(&mut self) -> Result<(), PipelineError> {
            Err(PipelineError::Staging {
                path: PathBuf::from("stuck"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "busy"),
            })
        }

        fn keeps_tables(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_release_failure_keeps_predictions() {
        let mut sink = StuckSink;
        let results = predict_localization(
            vec![("polyA", "AAAA"), ("mixed", "ACGT")],
            &AaaScorer,
            Some(&mut sink),
            &PipelineConfig::default(),
        )
        .unwrap();
        let ids: Vec<&str> = results.predictions.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["polyA", "mixed"]);
        assert_eq!(results.predictions[0].predicted_label, 1);
        assert!(results.staged.is_none());
    }

    #[test]
    fn test_prediction_output_text() {
        let results = predict_localization(
            vec![("polyA", "AAA")],
            &AaaScorer,
            None,
            &PipelineConfig::default(),
        )
        .unwrap();
        assert_eq!(
            results.get_prediction_output(),
            "seq_id\tsequence\tpred_label\tpred_prob\tlight_score\npolyA\tAAA\t1\t1\t1\n"
        );
    }
}
