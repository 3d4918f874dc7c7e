//! Task definitions and task results.
//!
//! A task is the unit of asynchronous work attached to a state (on-enter or
//! on-exit) or to a transition (guard). Tasks are a closed set of kinds, each
//! carrying its own typed parameters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use ts_rs::TS;

/// A named unit of work.
///
/// # Example
///
/// ```yaml
/// name: wait-for-rta
/// type: wait-for-file
/// path: /seq/runs/220101_SL-NVA_A/RTAComplete.txt
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct TaskDefinition {
    /// Human-readable task name, used in logs and run reports.
    pub name: String,

    /// What the task does.
    #[serde(flatten)]
    pub kind: TaskKind,
}

impl TaskDefinition {
    pub fn new(name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Shorthand for a [`TaskKind::WaitForFile`] task.
    pub fn wait_for_file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(name, TaskKind::WaitForFile { path: path.into() })
    }

    /// Shorthand for a [`TaskKind::DemultiplexMetrics`] task.
    pub fn demultiplex_metrics(name: impl Into<String>, stats_file: impl Into<PathBuf>) -> Self {
        Self::new(
            name,
            TaskKind::DemultiplexMetrics {
                stats_file: stats_file.into(),
            },
        )
    }
}

/// The closed set of task kinds understood by the engine.
///
/// `WaitForFile` and `DemultiplexMetrics` are pollable: the engine checks
/// them once per pass. `Demultiplex` and `Alignment` invoke the external Dragen tool and run on
/// their own worker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TaskKind {
    /// Succeeds once `path` exists on disk.
    WaitForFile {
        #[ts(type = "string")]
        path: PathBuf,
    },

    /// Converts a sequencing run's BCL output into per-sample FASTQ files.
    Demultiplex(DemultiplexParams),

    /// Aligns one sample's reads against a reference.
    Alignment(AlignmentParams),

    /// Summarizes `Demultiplex_Stats.csv`; fails if it is missing or malformed.
    #[serde(rename_all = "kebab-case")]
    DemultiplexMetrics {
        #[ts(type = "string")]
        stats_file: PathBuf,
    },
}

impl TaskKind {
    /// True for kinds that invoke an external process.
    pub fn is_process(&self) -> bool {
        matches!(self, TaskKind::Demultiplex(_) | TaskKind::Alignment(_))
    }

    /// Short label for the kind, used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::WaitForFile { .. } => "wait-for-file",
            TaskKind::Demultiplex(_) => "demultiplex",
            TaskKind::Alignment(_) => "alignment",
            TaskKind::DemultiplexMetrics { .. } => "demultiplex-metrics",
        }
    }
}

/// Parameters of a demultiplex invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct DemultiplexParams {
    /// Sequencing run folder holding the BCL files.
    #[ts(type = "string")]
    pub input_dir: PathBuf,

    /// Directory receiving FASTQ files and the `Reports/` folder.
    #[ts(type = "string")]
    pub output_dir: PathBuf,

    /// Sample sheet describing the samples on each lane.
    #[ts(type = "string")]
    pub sample_sheet: PathBuf,
}

/// Parameters of a per-sample alignment invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct AlignmentParams {
    /// Reference genome directory.
    #[ts(type = "string")]
    pub reference: PathBuf,

    /// The `fastq_list.csv` manifest written by demultiplexing.
    #[ts(type = "string")]
    pub fastq_list: PathBuf,

    /// Read group sample id (`RGSM`) to select from the manifest.
    pub fastq_list_sample_id: String,

    #[ts(type = "string")]
    pub output_dir: PathBuf,

    #[ts(type = "string")]
    pub intermediate_results_dir: PathBuf,

    /// Prefix for every output file of the run.
    pub output_file_prefix: String,

    /// Sample name written into the variant calls.
    pub vc_sample_name: String,

    /// Cross-contamination VCF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub contamination_file: Option<PathBuf>,

    /// Coverage region BED file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub coverage_bed: Option<PathBuf>,

    /// Reported sex of the sample, upper-cased (e.g. `FEMALE`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_sex: Option<String>,
}

/// Outcome of a finished task.
///
/// Success is defined solely by `exit_code == 0`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct TaskResult {
    /// Free-text description of the outcome.
    pub status: String,

    /// Exit code reported by the task; zero means success.
    pub exit_code: i32,
}

impl TaskResult {
    pub fn success(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32, status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Progress of a task as shown in run reports.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// The owning state or transition never got far enough to start it.
    NotStarted,

    /// Started and still outstanding.
    Running,

    /// Finished with exit code zero.
    Succeeded,

    /// Finished with a non-zero exit code.
    Failed,
}
