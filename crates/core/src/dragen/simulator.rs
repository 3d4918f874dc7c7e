//! Deterministic stand-in for the Dragen tool.
//!
//! Instead of running anything, the simulator writes the artifacts a real
//! run would leave behind that later pipeline steps depend on:
//!
//! - demultiplex: `Reports/fastq_list.csv`, `Reports/Demultiplex_Stats.csv`,
//!   `replay.json` and a `<sample>/<sample>-replay.json` per sample
//! - alignment: `<output-dir>/<prefix>-replay.json`

use crate::dragen::base::ExternalProcessRunner;
use crate::sample_sheet::{read_group_id, SampleSheet, FLOWCELL_KEY};
use crate::tasks::ProcessTask;
use async_trait::async_trait;
use serde::Serialize;
use sf_protocol::task_models::{AlignmentParams, DemultiplexParams, TaskResult};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::time::Duration;

/// Columns of the fastq list manifest.
pub const FASTQ_LIST_COLUMNS: [&str; 6] = ["RGID", "RGSM", "RGLB", "Lane", "Read1File", "Read2File"];

const DEMULTIPLEX_STATS_COLUMNS: [&str; 8] = [
    "Lane",
    "SampleID",
    "Index",
    "# Reads",
    "# Perfect Index Reads",
    "# One Mismatch Index Reads",
    "# of >= Q30 Bases (PF)",
    "Mean Quality Score (PF)",
];

#[derive(Serialize)]
struct ReplayInfo {
    system: ReplaySystem,
}

#[derive(Serialize)]
struct ReplaySystem {
    dragen_version: &'static str,
    kernel_release: &'static str,
    nodename: &'static str,
}

/// Simulated Dragen runner.
#[derive(Debug, Clone, Default)]
pub struct DragenSimulator {
    failing_samples: HashSet<String>,
    fail_demultiplex: bool,
    delay: Option<Duration>,
}

impl DragenSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every alignment of `sample` fail with exit code 1.
    ///
    /// The sample is matched against the alignment's output prefix and
    /// variant-calling sample name.
    pub fn with_failing_sample(mut self, sample: impl Into<String>) -> Self {
        self.failing_samples.insert(sample.into());
        self
    }

    /// Make every demultiplex invocation fail with exit code 1.
    pub fn with_failing_demultiplex(mut self) -> Self {
        self.fail_demultiplex = true;
        self
    }

    /// Sleep for `delay` before producing each result.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn demultiplex(&self, params: &DemultiplexParams) -> std::io::Result<TaskResult> {
        if self.fail_demultiplex {
            return Ok(TaskResult::failure(1, "Simulated demultiplex failure"));
        }
        if !params.sample_sheet.exists() {
            return Ok(TaskResult::success("Success"));
        }

        let sheet = match SampleSheet::read(&params.sample_sheet) {
            Ok(sheet) => sheet,
            Err(e) => return Ok(TaskResult::failure(1, e.to_string())),
        };

        let output_dir = &params.output_dir;
        let reports_dir = output_dir.join("Reports");
        std::fs::create_dir_all(&reports_dir)?;

        let flowcell = sheet
            .header_value(FLOWCELL_KEY)
            .map(str::to_string)
            .unwrap_or_else(|| dir_name(output_dir));

        let mut fastq_list = csv::Writer::from_path(reports_dir.join("fastq_list.csv"))?;
        fastq_list.write_record(FASTQ_LIST_COLUMNS)?;
        let mut stats = csv::Writer::from_path(reports_dir.join("Demultiplex_Stats.csv"))?;
        stats.write_record(DEMULTIPLEX_STATS_COLUMNS)?;
        let mut samples = BTreeSet::new();

        for record in &sheet.records {
            let lane = record.lane.to_string();
            let rg_id = read_group_id(&flowcell, record.lane, &record.sample_name);
            let read1 = fastq_path(output_dir, &record.sample_name, record.lane, 1);
            let read2 = fastq_path(output_dir, &record.sample_name, record.lane, 2);
            fastq_list.write_record([&rg_id, &rg_id, &rg_id, &lane, &read1, &read2])?;

            let index = match &record.index2 {
                Some(index2) => format!("{}-{}", record.index, index2),
                None => record.index.clone(),
            };
            stats.write_record([
                lane.as_str(),
                rg_id.as_str(),
                index.as_str(),
                "1000",
                "900",
                "100",
                "4000",
                "35.42",
            ])?;

            samples.insert(record.sample_name.as_str());
        }

        fastq_list.flush()?;
        stats.flush()?;
        write_replay(&output_dir.join("replay.json"))?;

        for sample in samples {
            let sample_dir = output_dir.join(sample);
            std::fs::create_dir_all(&sample_dir)?;
            write_replay(&sample_dir.join(format!("{sample}-replay.json")))?;
        }

        Ok(TaskResult::success("Success"))
    }

    fn alignment(&self, params: &AlignmentParams) -> std::io::Result<TaskResult> {
        if self.failing_samples.contains(&params.output_file_prefix)
            || self.failing_samples.contains(&params.vc_sample_name)
        {
            return Ok(TaskResult::failure(
                1,
                format!("Simulated alignment failure for {}", params.vc_sample_name),
            ));
        }

        std::fs::create_dir_all(&params.output_dir)?;
        write_replay(
            &params
                .output_dir
                .join(format!("{}-replay.json", params.output_file_prefix)),
        )?;

        Ok(TaskResult::success("Success"))
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn fastq_path(output_dir: &Path, sample: &str, lane: u32, read: u8) -> String {
    output_dir
        .join(format!("{sample}_L{lane:03}_R{read}_001.fastq.gz"))
        .display()
        .to_string()
}

fn write_replay(path: &Path) -> std::io::Result<()> {
    let info = ReplayInfo {
        system: ReplaySystem {
            dragen_version: "01.011.308.3.3.7",
            kernel_release: "3.10.0-862.6.3.el7.x86_64",
            nodename: "dragen01",
        },
    };
    let json = serde_json::to_string_pretty(&info)?;
    std::fs::write(path, json)
}

#[async_trait]
impl ExternalProcessRunner for DragenSimulator {
    async fn execute(&self, command_line: &str, task: &ProcessTask) -> TaskResult {
        tracing::info!(task = task.label(), %command_line, "Simulating Dragen");

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = match task {
            ProcessTask::Demultiplex(params) => self.demultiplex(params),
            ProcessTask::Alignment(params) => self.alignment(params),
        };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(task = task.label(), error = %e, "Simulated run failed");
                TaskResult::failure(1, format!("Simulator I/O error: {e}"))
            }
        }
    }

    fn program(&self) -> &str {
        "dragen"
    }
}
