//src/staging.rs

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::PipelineError;
use crate::feature_matrix::FeatureMatrix;

/// Receives the assembled feature tables before inference.
///
/// The pipeline calls `stage` once per batch and `release` once inference has
/// finished, successfully or not.
pub trait FeatureSink {
    fn stage(
        &mut self,
        frequencies: &FeatureMatrix<'_, f64>,
        raw_counts: &FeatureMatrix<'_, u32>,
    ) -> Result<StagedTables, PipelineError>;

    fn release(&mut self) -> Result<(), PipelineError>;

    /// Whether staged files still exist after `release`.
    fn keeps_tables(&self) -> bool;
}

/// Where the two tables of a batch were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedTables {
    pub frequency_path: PathBuf,
    pub raw_count_path: PathBuf,
}

/// `kmer` followed by the k-mer lengths present in `columns`, in column
/// order: `kmer345` for the default vocabulary.
pub fn kmer_tag(columns: &[String]) -> String {
    let mut tag = String::from("kmer");
    let mut last = None;
    for len in columns.iter().map(String::len) {
        if last != Some(len) {
            tag.push_str(&len.to_string());
            last = Some(len);
        }
    }
    tag
}

fn table_paths(dir: &Path, prefix: &str, tag: &str) -> StagedTables {
    StagedTables {
        frequency_path: dir.join(format!("{prefix}_{tag}_freq.tsv")),
        raw_count_path: dir.join(format!("{prefix}_{tag}_rawcount.tsv")),
    }
}

fn write_tables(
    dir: &Path,
    prefix: &str,
    frequencies: &FeatureMatrix<'_, f64>,
    raw_counts: &FeatureMatrix<'_, u32>,
) -> Result<StagedTables, PipelineError> {
    let paths = table_paths(dir, prefix, &kmer_tag(frequencies.columns()));
    let staging_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| PipelineError::Staging { path, source }
    };
    frequencies
        .write_tsv_file(&paths.frequency_path)
        .map_err(staging_err(paths.frequency_path.as_path()))?;
    raw_counts
        .write_tsv_file(&paths.raw_count_path)
        .map_err(staging_err(paths.raw_count_path.as_path()))?;
    Ok(paths)
}

/// Stages tables in a scratch directory that is removed on `release`, or when
/// the sink is dropped if `release` never ran.
pub struct TempStaging {
    parent: PathBuf,
    prefix: String,
    dir: Option<TempDir>,
}

impl TempStaging {
    /// Scratch directories are created under `parent`.
    pub fn new<P: AsRef<Path>>(parent: P, prefix: impl Into<String>) -> Self {
        Self {
            parent: parent.as_ref().to_path_buf(),
            prefix: prefix.into(),
            dir: None,
        }
    }

    /// The current scratch directory, while tables are staged.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(|d| d.path())
    }
}

impl FeatureSink for TempStaging {
    fn stage(
        &mut self,
        frequencies: &FeatureMatrix<'_, f64>,
        raw_counts: &FeatureMatrix<'_, u32>,
    ) -> Result<StagedTables, PipelineError> {
        // drop anything left from an earlier batch
        self.release()?;

        std::fs::create_dir_all(&self.parent).map_err(|source| PipelineError::Staging {
            path: self.parent.clone(),
            source,
        })?;
        let dir = tempfile::Builder::new()
            .prefix("rnalight-")
            .tempdir_in(&self.parent)
            .map_err(|source| PipelineError::Staging {
                path: self.parent.clone(),
                source,
            })?;
        log::debug!("Staging feature tables under {}", dir.path().display());

        let tables = write_tables(dir.path(), &self.prefix, frequencies, raw_counts);
        self.dir = Some(dir);
        tables
    }

    fn release(&mut self) -> Result<(), PipelineError> {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            dir.close().map_err(|source| PipelineError::Staging {
                path: path.clone(),
                source,
            })?;
            log::debug!("Removed staged tables in {}", path.display());
        }
        Ok(())
    }

    fn keeps_tables(&self) -> bool {
        false
    }
}

/// Writes tables to a fixed directory and keeps them.
pub struct ExportSink {
    dir: PathBuf,
    prefix: String,
}

impl ExportSink {
    pub fn new<P: AsRef<Path>>(dir: P, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix: prefix.into(),
        }
    }
}

impl FeatureSink for ExportSink {
    fn stage(
        &mut self,
        frequencies: &FeatureMatrix<'_, f64>,
        raw_counts: &FeatureMatrix<'_, u32>,
    ) -> Result<StagedTables, PipelineError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| PipelineError::Staging {
            path: self.dir.clone(),
            source,
        })?;
        let tables = write_tables(&self.dir, &self.prefix, frequencies, raw_counts)?;
        log::info!(
            "Exported feature tables to {} and {}",
            tables.frequency_path.display(),
            tables.raw_count_path.display()
        );
        Ok(tables)
    }

    fn release(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }

    fn keeps_tables(&self) -> bool {
        true
    }
}
