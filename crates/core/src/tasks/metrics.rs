//! Demultiplexing summary task.

use crate::tasks::Pollable;
use csv::{ReaderBuilder, Trim};
use sf_protocol::task_models::TaskResult;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SAMPLE_COLUMN: &str = "SampleID";
const READS_COLUMN: &str = "# Reads";

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Cannot read demultiplex stats {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Demultiplex stats {path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("Invalid read count '{value}' on line {line} of {path}")]
    InvalidCount {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("Demultiplex stats {0} lists no samples")]
    Empty(PathBuf),
}

/// Totals read from `Demultiplex_Stats.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemultiplexMetrics {
    /// Distinct sample ids, across every lane.
    pub samples: usize,
    pub reads: u64,
}

/// Reads the demultiplexing statistics once they have been written.
///
/// Finishes on its first poll. A missing or unreadable file, a missing
/// `SampleID` or `# Reads` column, a non-numeric read count and a file with
/// no rows all fail the task with exit code 1.
#[derive(Debug, Clone)]
pub struct DemultiplexMetricsTask {
    stats_file: PathBuf,
}

impl DemultiplexMetricsTask {
    pub fn new(stats_file: impl Into<PathBuf>) -> Self {
        Self {
            stats_file: stats_file.into(),
        }
    }

    pub fn stats_file(&self) -> &Path {
        &self.stats_file
    }

    pub fn summarize(&self) -> Result<DemultiplexMetrics, MetricsError> {
        let path = &self.stats_file;
        let csv_err = |source| MetricsError::Csv {
            path: path.clone(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .from_path(path)
            .map_err(csv_err)?;
        let headers = reader.headers().map_err(csv_err)?.clone();
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| MetricsError::MissingColumn {
                    path: path.clone(),
                    column: name,
                })
        };
        let sample_col = column(SAMPLE_COLUMN)?;
        let reads_col = column(READS_COLUMN)?;

        let mut samples = BTreeSet::new();
        let mut reads = 0u64;
        for row in reader.records() {
            let row = row.map_err(csv_err)?;
            let value = row.get(reads_col).unwrap_or_default();
            let count = value.parse::<u64>().map_err(|_| MetricsError::InvalidCount {
                path: path.clone(),
                line: row.position().map_or(0, |p| p.line()),
                value: value.to_string(),
            })?;
            reads += count;
            samples.insert(row.get(sample_col).unwrap_or_default().to_string());
        }

        if samples.is_empty() {
            return Err(MetricsError::Empty(path.clone()));
        }
        Ok(DemultiplexMetrics {
            samples: samples.len(),
            reads,
        })
    }
}

impl Pollable for DemultiplexMetricsTask {
    fn poll(&mut self) -> Option<TaskResult> {
        let result = match self.summarize() {
            Ok(metrics) => {
                tracing::info!(
                    stats_file = %self.stats_file.display(),
                    samples = metrics.samples,
                    reads = metrics.reads,
                    "Demultiplexing summary"
                );
                TaskResult::success(format!(
                    "{} samples, {} reads",
                    metrics.samples, metrics.reads
                ))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Demultiplexing summary failed");
                TaskResult::failure(1, e.to_string())
            }
        };
        Some(result)
    }
}
