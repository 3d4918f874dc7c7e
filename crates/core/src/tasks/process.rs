//! Tasks that invoke the external Dragen tool.

use crate::dragen::ExternalProcessRunner;
use crate::tasks::Runnable;
use async_trait::async_trait;
use sf_protocol::task_models::{AlignmentParams, DemultiplexParams, TaskResult};
use std::path::Path;

/// An external process invocation with typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessTask {
    Demultiplex(DemultiplexParams),
    Alignment(AlignmentParams),
}

impl ProcessTask {
    /// Arguments passed to the program, one entry per argv slot.
    ///
    /// Paths are rendered with `Path::display`; flag order is fixed so the
    /// same parameters always produce the same arguments. Values are never
    /// split or interpreted by a shell.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        match self {
            ProcessTask::Demultiplex(params) => {
                push_flag(&mut args, "--bcl-conversion-only", "true");
                push_path(&mut args, "--bcl-input-directory", &params.input_dir);
                push_path(&mut args, "--output-directory", &params.output_dir);
                push_path(&mut args, "--sample-sheet", &params.sample_sheet);
                args.push("--force".to_string());
            }
            ProcessTask::Alignment(params) => {
                push_path(&mut args, "-r", &params.reference);
                push_path(&mut args, "--fastq-list", &params.fastq_list);
                push_flag(&mut args, "--fastq-list-sample-id", &params.fastq_list_sample_id);
                push_path(&mut args, "--output-directory", &params.output_dir);
                push_path(
                    &mut args,
                    "--intermediate-results-dir",
                    &params.intermediate_results_dir,
                );
                push_flag(&mut args, "--output-file-prefix", &params.output_file_prefix);
                push_flag(&mut args, "--vc-sample-name", &params.vc_sample_name);
                push_flag(&mut args, "--enable-map-align", "true");
                push_flag(&mut args, "--enable-variant-caller", "true");
                if let Some(vcf) = &params.contamination_file {
                    push_path(&mut args, "--qc-cross-cont-vcf", vcf);
                }
                if let Some(bed) = &params.coverage_bed {
                    push_path(&mut args, "--qc-coverage-region-1", bed);
                }
                if let Some(sex) = &params.sample_sex {
                    push_flag(&mut args, "--sample-sex", &sex.to_uppercase());
                }
            }
        }
        args
    }

    /// Human-readable command line for `program`, for logs and reports.
    ///
    /// This is a display form only; arguments containing spaces are not
    /// quoted and the line must not be handed to a shell.
    pub fn command_line(&self, program: &str) -> String {
        std::iter::once(program.to_string())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ProcessTask::Demultiplex(_) => "demultiplex",
            ProcessTask::Alignment(_) => "alignment",
        }
    }
}

fn push_flag(args: &mut Vec<String>, flag: &str, value: &str) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

fn push_path(args: &mut Vec<String>, flag: &str, value: &Path) {
    push_flag(args, flag, &value.display().to_string());
}

#[async_trait]
impl Runnable for ProcessTask {
    async fn run(&self, runner: &dyn ExternalProcessRunner) -> TaskResult {
        let command_line = self.command_line(runner.program());
        tracing::debug!(task = self.label(), %command_line, "Invoking external process");
        runner.execute(&command_line, self).await
    }
}
