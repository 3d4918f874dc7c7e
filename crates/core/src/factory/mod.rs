//! Builds the standard sequencing-run pipeline.
//!
//! ```text
//! SequencingRunComplete --[RTAComplete.txt]--> Demultiplex --+--> Align_<fc>_<lane>_<sample>
//!                                                            +--> Align_<fc>_<lane>_<sample>
//!                                                            +--> ...
//! ```
//!
//! The demultiplex state carries an exit task that reads
//! `Reports/Demultiplex_Stats.csv`; alignments start only once it succeeds.

use crate::machine::{GraphError, StateMachine, StateMachineBuilder};
use crate::sample_sheet::{
    read_group_id, SampleRecord, SampleSheet, SampleSheetError, FLOWCELL_KEY, RUN_NAME_KEY,
};
use chrono::{DateTime, Utc};
use sf_protocol::config_models::DragenConfig;
use sf_protocol::machine_models::{StateDefinition, TransitionDefinition};
use sf_protocol::task_models::{AlignmentParams, DemultiplexParams, TaskDefinition, TaskKind};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the start state.
pub const SEQUENCING_COMPLETE_STATE: &str = "SequencingRunComplete";

/// Name of the demultiplexing state.
pub const DEMULTIPLEX_STATE: &str = "Demultiplex";

/// Transition from run completion to demultiplexing.
pub const SEQUENCING_TO_DEMULTIPLEX: &str = "Sequencing Complete To Demultiplexing";

/// File the sequencer writes once a run is complete.
pub const RTA_COMPLETE_FILE: &str = "RTAComplete.txt";

#[derive(Error, Debug)]
pub enum FactoryError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    SampleSheet(#[from] SampleSheetError),

    #[error("Failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type FactoryResult<T> = Result<T, FactoryError>;

/// A sequencing run on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencingRun {
    /// Run folder name, e.g. `220101_SL-NVA_0001_AHXXXXX`.
    pub run_name: String,

    /// Directory the sequencer writes to.
    pub run_dir: PathBuf,

    /// Flowcell barcode.
    pub flowcell: String,
}

impl SequencingRun {
    /// Describe the run at `run_dir`, named after its folder.
    pub fn new(run_dir: impl Into<PathBuf>, flowcell: impl Into<String>) -> Self {
        let run_dir = run_dir.into();
        let run_name = run_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            run_name,
            run_dir,
            flowcell: flowcell.into(),
        }
    }

    pub fn rta_complete(&self) -> PathBuf {
        self.run_dir.join(RTA_COMPLETE_FILE)
    }
}

/// Output layout for one analysis of a run:
/// `<output-root>/<run-name>/<stamp>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragenFolders {
    analysis_dir: PathBuf,
}

impl DragenFolders {
    pub fn new(output_root: &Path, run_name: &str, stamp: &str) -> Self {
        Self {
            analysis_dir: output_root.join(run_name).join(stamp),
        }
    }

    /// Layout stamped with `at`, to the second.
    pub fn stamped(output_root: &Path, run_name: &str, at: DateTime<Utc>) -> Self {
        Self::new(output_root, run_name, &at.format("%Y%m%d%H%M%S").to_string())
    }

    pub fn analysis_dir(&self) -> &Path {
        &self.analysis_dir
    }

    pub fn sample_sheet(&self) -> PathBuf {
        self.analysis_dir.join("SampleSheet_hsa.csv")
    }

    pub fn fastq_dir(&self) -> PathBuf {
        self.analysis_dir.join("fastq")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.fastq_dir().join("Reports")
    }

    pub fn fastq_list(&self) -> PathBuf {
        self.reports_dir().join("fastq_list.csv")
    }

    pub fn demultiplex_stats(&self) -> PathBuf {
        self.reports_dir().join("Demultiplex_Stats.csv")
    }

    pub fn alignment_dir(&self, read_group: &str) -> PathBuf {
        self.analysis_dir.join("alignment").join(read_group)
    }
}

/// A generated pipeline together with the folders it writes to.
#[derive(Debug)]
pub struct RunPlan {
    pub machine: StateMachine,
    pub folders: DragenFolders,
}

/// Creates run machines from a Dragen configuration.
#[derive(Debug, Clone)]
pub struct RunMachineFactory {
    config: DragenConfig,
}

impl RunMachineFactory {
    pub fn new(config: DragenConfig) -> Self {
        Self { config }
    }

    /// Name of the alignment state for one record.
    pub fn alignment_state(flowcell: &str, record: &SampleRecord) -> String {
        format!("Align_{}_{}_{}", flowcell, record.lane, record.sample_name)
    }

    /// Build the pipeline for `run`, writing into a freshly stamped folder.
    pub fn create_run_machine(
        &self,
        run: &SequencingRun,
        records: &[SampleRecord],
    ) -> FactoryResult<RunPlan> {
        let folders = DragenFolders::stamped(&self.config.output_root, &run.run_name, Utc::now());
        self.create_run_machine_in(run, records, folders)
    }

    /// Build the pipeline for `run` using the given folders.
    ///
    /// The sample sheet is written to the analysis folder before the
    /// machine is built.
    pub fn create_run_machine_in(
        &self,
        run: &SequencingRun,
        records: &[SampleRecord],
        folders: DragenFolders,
    ) -> FactoryResult<RunPlan> {
        std::fs::create_dir_all(folders.analysis_dir()).map_err(|source| FactoryError::Io {
            path: folders.analysis_dir().to_path_buf(),
            source,
        })?;

        SampleSheet::new(records.to_vec())
            .with_header(RUN_NAME_KEY, &run.run_name)
            .with_header(FLOWCELL_KEY, &run.flowcell)
            .write(&folders.sample_sheet())?;

        let demultiplex = TaskDefinition::new(
            format!("Demultiplex {}", run.run_name),
            TaskKind::Demultiplex(DemultiplexParams {
                input_dir: run.run_dir.clone(),
                output_dir: folders.fastq_dir(),
                sample_sheet: folders.sample_sheet(),
            }),
        );

        let mut builder = StateMachineBuilder::new(run.run_name.clone())
            .state(
                StateDefinition::new(SEQUENCING_COMPLETE_STATE)
                    .start()
                    .with_label("Sequencing Run Complete"),
            )
            .state(
                StateDefinition::new(DEMULTIPLEX_STATE)
                    .on_enter(demultiplex)
                    .on_exit(TaskDefinition::demultiplex_metrics(
                        format!("Demultiplex metrics {}", run.run_name),
                        folders.demultiplex_stats(),
                    )),
            )
            .transition(
                TransitionDefinition::new(
                    SEQUENCING_TO_DEMULTIPLEX,
                    SEQUENCING_COMPLETE_STATE,
                    DEMULTIPLEX_STATE,
                )
                .guarded_by(TaskDefinition::wait_for_file(
                    format!("Wait for {RTA_COMPLETE_FILE}"),
                    run.rta_complete(),
                )),
            );

        for record in records {
            let state = Self::alignment_state(&run.flowcell, record);
            let read_group = read_group_id(&run.flowcell, record.lane, &record.sample_name);
            let alignment = TaskDefinition::new(
                format!("Align {read_group}"),
                TaskKind::Alignment(AlignmentParams {
                    reference: self.config.reference.clone(),
                    fastq_list: folders.fastq_list(),
                    fastq_list_sample_id: read_group.clone(),
                    output_dir: folders.alignment_dir(&read_group),
                    intermediate_results_dir: self.config.intermediate_results.clone(),
                    output_file_prefix: record.sample_name.clone(),
                    vc_sample_name: record.sample_name.clone(),
                    contamination_file: None,
                    coverage_bed: None,
                    sample_sex: None,
                }),
            );

            builder.add_state(StateDefinition::new(state.clone()).on_enter(alignment));
            builder.add_transition(TransitionDefinition::new(
                format!("{DEMULTIPLEX_STATE} To {state}"),
                DEMULTIPLEX_STATE,
                state,
            ));
        }

        let machine = builder.build()?;
        tracing::info!(
            run = %run.run_name,
            samples = records.len(),
            analysis_dir = %folders.analysis_dir().display(),
            "Created run machine"
        );

        Ok(RunPlan { machine, folders })
    }
}
