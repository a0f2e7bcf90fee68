//src/linear_model.rs

use std::io::BufRead;
use std::path::Path;

use crate::classifier::Classifier;
use crate::error::{ClassifierError, PipelineError};
use crate::sequence_io::open_reader;

/// Logistic regression over k-mer frequencies.
///
/// The weights file is plain TSV:
/// ```text
/// # comment
/// intercept   -0.42
/// threshold   0.5        (optional, defaults to 0.5)
/// AAA         0.013
/// AAC         -0.2
/// ...
/// ```
/// Feature lines are kept in file order and reported as the model's feature
/// names, so a file written for another column order is caught before inference.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    intercept: f64,
    threshold: f64,
    names: Vec<String>,
    weights: Vec<f64>,
}

impl LinearModel {
    /// `names[i]` is the column `weights[i]` applies to.
    pub fn new(
        names: Vec<String>,
        weights: Vec<f64>,
        intercept: f64,
        threshold: f64,
    ) -> Result<Self, PipelineError> {
        if names.len() != weights.len() {
            return Err(PipelineError::ModelShape {
                names: names.len(),
                weights: weights.len(),
            });
        }
        Ok(Self {
            intercept,
            threshold,
            names,
            weights,
        })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let model = Self::from_reader(open_reader(path)?)?;
        log::info!(
            "Loaded linear model from {} ({} features, threshold {})",
            path.display(),
            model.weights.len(),
            model.threshold
        );
        Ok(model)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, PipelineError> {
        let mut intercept = None;
        let mut threshold = 0.5;
        let mut names = Vec::new();
        let mut weights = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = i + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let format_err = |msg: String| PipelineError::ModelFormat { line: line_no, msg };
            let mut fields = line.split('\t');
            let (Some(key), Some(value), None) = (fields.next(), fields.next(), fields.next()) else {
                return Err(format_err(format!("expected `name<TAB>value`, got {line:?}")));
            };
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|e| format_err(format!("bad value for {key}: {e}")))?;
            if !value.is_finite() {
                return Err(format_err(format!("non-finite value for {key}")));
            }

            match key.trim() {
                "intercept" => intercept = Some(value),
                "threshold" => {
                    if !(0.0..=1.0).contains(&value) {
                        return Err(format_err(format!("threshold {value} outside [0, 1]")));
                    }
                    threshold = value;
                }
                name => {
                    names.push(name.to_string());
                    weights.push(value);
                }
            }
        }

        let intercept = intercept.ok_or_else(|| PipelineError::ModelFormat {
            line: 0,
            msg: "missing intercept".to_string(),
        })?;
        if weights.is_empty() {
            return Err(PipelineError::ModelFormat {
                line: 0,
                msg: "no feature weights".to_string(),
            });
        }
        Self::new(names, weights, intercept, threshold)
    }

    fn probability(&self, row: &[f64]) -> f64 {
        let z = self.intercept
            + self
                .weights
                .iter()
                .zip(row)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }

    fn check_rows(&self, features: &[Vec<f64>]) -> Result<(), ClassifierError> {
        match features.iter().position(|r| r.len() != self.weights.len()) {
            Some(i) => Err(ClassifierError::new(format!(
                "row {i} has {} features, model expects {}",
                features[i].len(),
                self.weights.len()
            ))),
            None => Ok(()),
        }
    }
}

impl Classifier for LinearModel {
    fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.names)
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<u8>, ClassifierError> {
        self.check_rows(features)?;
        Ok(features
            .iter()
            .map(|r| u8::from(self.probability(r) >= self.threshold))
            .collect())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ClassifierError> {
        self.check_rows(features)?;
        Ok(features.iter().map(|r| self.probability(r)).collect())
    }
}
