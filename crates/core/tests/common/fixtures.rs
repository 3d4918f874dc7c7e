//! Test fixtures for engines, machines and sequencing runs.

use async_trait::async_trait;
use sf_core::dragen::{DragenSimulator, ExternalProcessRunner};
use sf_core::engine::FiniteStateMachineEngine;
use sf_core::factory::{DragenFolders, RunMachineFactory, RunPlan, SequencingRun};
use sf_core::sample_sheet::SampleRecord;
use sf_core::tasks::ProcessTask;
use sf_protocol::config_models::DragenConfig;
use sf_protocol::ipc::Event;
use sf_protocol::task_models::{AlignmentParams, DemultiplexParams, TaskDefinition, TaskKind, TaskResult};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Poll interval used by every test engine.
pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Flowcell used by sequencing run fixtures.
pub const TEST_FLOWCELL: &str = "HXXXXXDSX3";

/// Engine with a short poll interval around `runner`.
pub fn fast_engine(runner: Arc<dyn ExternalProcessRunner>) -> FiniteStateMachineEngine {
    FiniteStateMachineEngine::new(runner).with_poll_interval(TEST_POLL_INTERVAL)
}

/// Engine backed by a default simulator.
pub fn simulator_engine() -> FiniteStateMachineEngine {
    fast_engine(Arc::new(DragenSimulator::new()))
}

/// Engine that also streams its events into the returned receiver.
pub fn engine_with_events(
    runner: Arc<dyn ExternalProcessRunner>,
) -> (FiniteStateMachineEngine, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(1024);
    (fast_engine(runner).with_events(tx), rx)
}

/// `count` records spread over eight lanes, named `SM-001` and up.
pub fn sample_records(count: usize) -> Vec<SampleRecord> {
    (0..count)
        .map(|i| {
            let lane = (i % 8) as u32 + 1;
            SampleRecord::new(lane, format!("SM-{:03}", i + 1), format!("ACGT{i:04}"))
        })
        .collect()
}

/// A sequencing run folder under `root`, created on disk.
pub fn sequencing_run(root: &Path) -> std::io::Result<SequencingRun> {
    let run_dir = root.join("runs").join("220101_SL-NVA_0001_AHXXXXXDSX3");
    std::fs::create_dir_all(&run_dir)?;
    Ok(SequencingRun::new(run_dir, TEST_FLOWCELL))
}

/// Dragen configuration writing under `root/dragen`.
pub fn dragen_config(root: &Path) -> DragenConfig {
    DragenConfig {
        output_root: root.join("dragen"),
        intermediate_results: root.join("staging"),
        reference: root.join("reference"),
        ..DragenConfig::default()
    }
}

/// Build the standard pipeline for `run` with a fixed analysis stamp.
pub fn run_plan(root: &Path, run: &SequencingRun, records: &[SampleRecord]) -> RunPlan {
    let config = dragen_config(root);
    let folders = DragenFolders::new(&config.output_root, &run.run_name, "20220101120000");
    RunMachineFactory::new(config)
        .create_run_machine_in(run, records, folders)
        .expect("Failed to create run machine")
}

/// Demultiplex task writing into `root`.
pub fn demultiplex_task(name: &str, root: &Path) -> TaskDefinition {
    TaskDefinition::new(
        name,
        TaskKind::Demultiplex(DemultiplexParams {
            input_dir: root.join("run"),
            output_dir: root.join("fastq"),
            sample_sheet: root.join("absent.csv"),
        }),
    )
}

/// Alignment task for `sample` writing into `root`.
pub fn alignment_task(sample: &str, root: &Path) -> TaskDefinition {
    TaskDefinition::new(
        format!("Align {sample}"),
        TaskKind::Alignment(AlignmentParams {
            reference: root.join("reference"),
            fastq_list: root.join("fastq_list.csv"),
            fastq_list_sample_id: sample.to_string(),
            output_dir: root.join("alignment").join(sample),
            intermediate_results_dir: root.join("staging"),
            output_file_prefix: sample.to_string(),
            vc_sample_name: sample.to_string(),
            contamination_file: None,
            coverage_bed: None,
            sample_sex: None,
        }),
    )
}

/// Runner that counts invocations per command line and delegates to a
/// simulator.
#[derive(Default)]
pub struct CountingRunner {
    inner: DragenSimulator,
    calls: Mutex<HashMap<String, usize>>,
}

impl CountingRunner {
    pub fn new(inner: DragenSimulator) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Total number of executions.
    pub fn total(&self) -> usize {
        self.calls.lock().expect("calls lock").values().sum()
    }

    /// Highest number of executions of a single command line.
    pub fn max_per_command(&self) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ExternalProcessRunner for CountingRunner {
    async fn execute(&self, command_line: &str, task: &ProcessTask) -> TaskResult {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(command_line.to_string())
            .or_default() += 1;
        self.inner.execute(command_line, task).await
    }

    fn program(&self) -> &str {
        self.inner.program()
    }
}
