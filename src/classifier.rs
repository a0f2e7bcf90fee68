//src/classifier.rs

use crate::error::{ClassifierError, PipelineError};
use crate::feature_matrix::FeatureMatrix;
use crate::types::{PredictionRecord, SequenceRecord};

/// A trained binary classifier over k-mer frequency rows.
///
/// Rows passed to `predict` / `predict_proba` carry no identifier; columns are
/// in vocabulary order. Both methods must return exactly one value per row, in
/// row order.
pub trait Classifier {
    /// Number of input columns the model was trained on.
    fn n_features(&self) -> usize;

    /// Column names seen at training time, when the model kept them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Predicted class (0 or 1) per row.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<u8>, ClassifierError>;

    /// Probability of the positive class per row.
    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ClassifierError>;
}

/// Classifier output for a single row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowPrediction {
    pub label: u8,
    pub probability: f64,
}

/// Checks that the matrix has the width, and if the model knows them the column
/// names, the classifier was trained on.
pub fn check_schema<C: Classifier + ?Sized>(
    classifier: &C,
    matrix: &FeatureMatrix<'_, f64>,
) -> Result<(), PipelineError> {
    let expected = classifier.n_features();
    if expected != matrix.n_cols() {
        return Err(PipelineError::SchemaMismatch {
            expected,
            found: matrix.n_cols(),
        });
    }

    if let Some(names) = classifier.feature_names() {
        if names.len() != matrix.n_cols() {
            return Err(PipelineError::SchemaMismatch {
                expected: names.len(),
                found: matrix.n_cols(),
            });
        }
        if let Some((position, (want, got))) = names
            .iter()
            .zip(matrix.columns())
            .enumerate()
            .find(|(_, (want, got))| want != got)
        {
            return Err(PipelineError::ColumnOrderMismatch {
                position,
                expected: want.clone(),
                found: got.clone(),
            });
        }
    }
    Ok(())
}

/// Runs the classifier over the frequency table (identifier column excluded)
/// and validates what comes back. Any failure aborts the whole batch.
pub fn infer<C: Classifier + ?Sized>(
    classifier: &C,
    matrix: &FeatureMatrix<'_, f64>,
) -> Result<Vec<RowPrediction>, PipelineError> {
    check_schema(classifier, matrix)?;

    let n = matrix.n_rows();
    if n == 0 {
        return Ok(Vec::new());
    }

    let features = matrix.rows();
    let labels = classifier.predict(features)?;
    let probabilities = classifier.predict_proba(features)?;

    for found in [labels.len(), probabilities.len()] {
        if found != n {
            return Err(PipelineError::PredictionLength { expected: n, found });
        }
    }

    labels
        .into_iter()
        .zip(probabilities)
        .enumerate()
        .map(|(row, (label, probability))| {
            if label > 1 {
                return Err(PipelineError::InvalidLabel { row, label });
            }
            if !(0.0..=1.0).contains(&probability) {
                return Err(PipelineError::InvalidProbability { row, probability });
            }
            Ok(RowPrediction { label, probability })
        })
        .collect()
}

/// Zips predictions back onto their records. Both slices are in batch order.
pub fn annotate(records: Vec<SequenceRecord>, predictions: &[RowPrediction]) -> Vec<PredictionRecord> {
    debug_assert_eq!(records.len(), predictions.len());
    records
        .into_iter()
        .zip(predictions)
        .map(|(rec, p)| PredictionRecord::from_record(rec, p.label, p.probability))
        .collect()
}
