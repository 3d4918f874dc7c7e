//! seqflow - Dragen sequencing-run orchestration.
//!
//! Usage:
//!   seqflow run <MACHINE>                  Run a machine from `.seqflow/machines/`
//!   seqflow demux <RUN_DIR> -s <SHEET>     Demultiplex and align a sequencing run
//!   seqflow validate                       Validate every machine definition
//!   seqflow list                           List machine definitions

mod report;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use colored::Colorize;
use sf_core::config::loader::load_config;
use sf_core::config::models::AppConfig;
use sf_core::dragen::runner_from_config;
use sf_core::engine::FiniteStateMachineEngine;
use sf_core::factory::{RunMachineFactory, SequencingRun};
use sf_core::machine::StateMachine;
use sf_core::runs::RunManager;
use sf_core::sample_sheet::{SampleSheet, FLOWCELL_KEY};
use sf_protocol::ipc::Event;
use sf_protocol::report_models::RunReport;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// seqflow - state machine orchestration for Dragen sequencing runs
#[derive(Parser)]
#[command(name = "seqflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root containing the `.seqflow/` directory
    #[arg(short = 'C', long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a machine defined in `.seqflow/machines/`
    Run {
        /// Name of the machine definition
        #[arg(value_name = "MACHINE")]
        machine: String,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Demultiplex a sequencing run and align every sample
    Demux {
        /// Directory the sequencer writes the run to
        #[arg(value_name = "RUN_DIR")]
        run_dir: PathBuf,

        /// Sample sheet listing the run's samples
        #[arg(short, long)]
        sample_sheet: PathBuf,

        /// Flowcell barcode (default: the sample sheet's Flowcell header)
        #[arg(short, long)]
        flowcell: Option<String>,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate every machine definition without running
    Validate,

    /// List machine definitions
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.root)
        .await
        .wrap_err_with(|| format!("Failed to load configuration from {}", cli.root.display()))?;

    match cli.command {
        Commands::Run { machine, json } => {
            let machine = config
                .build_machine(&machine)
                .ok_or_else(|| eyre!("Machine '{}' not found", machine))??;
            execute(&config, machine, json).await
        }
        Commands::Demux {
            run_dir,
            sample_sheet,
            flowcell,
            json,
        } => {
            let machine = plan_run(&config, &cli.root, &run_dir, &sample_sheet, flowcell)?;
            execute(&config, machine, json).await
        }
        Commands::Validate => validate(&config),
        Commands::List => {
            list(&config);
            Ok(())
        }
    }
}

/// Build the standard pipeline for a sequencing run.
///
/// A relative output root is resolved against the project root.
fn plan_run(
    config: &AppConfig,
    root: &Path,
    run_dir: &Path,
    sample_sheet: &Path,
    flowcell: Option<String>,
) -> Result<StateMachine> {
    let sheet = SampleSheet::read(sample_sheet)?;
    if sheet.records.is_empty() {
        return Err(eyre!("No samples in {}", sample_sheet.display()));
    }

    let flowcell = flowcell
        .or_else(|| sheet.header_value(FLOWCELL_KEY).map(str::to_string))
        .ok_or_else(|| {
            eyre!(
                "No flowcell given and {} has no {} header",
                sample_sheet.display(),
                FLOWCELL_KEY
            )
        })?;

    let mut dragen = config.global.dragen.clone();
    if dragen.output_root.is_relative() {
        dragen.output_root = root.join(&dragen.output_root);
    }

    let run = SequencingRun::new(run_dir, flowcell);
    let plan = RunMachineFactory::new(dragen)
        .create_run_machine(&run, &sheet.records)?;

    Ok(plan.machine)
}

/// Run `machine` to the end, honouring Ctrl-C and the configured timeout.
async fn execute(config: &AppConfig, machine: StateMachine, json: bool) -> Result<()> {
    let (events_tx, events_rx) = mpsc::channel(256);
    let engine = FiniteStateMachineEngine::from_config(
        runner_from_config(&config.global.dragen),
        &config.global,
    )
    .with_events(events_tx);

    let manager = Arc::new(RunManager::new(engine));
    let printer = tokio::spawn(print_events(events_rx, !json));
    let id = manager.start(Arc::new(machine)).await;

    let stopper = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; stopping run");
                manager.stop_all().await;
            }
        })
    };

    let report = manager.wait(id, config.run_timeout()).await;
    stopper.abort();
    let _ = stopper.await;
    drop(manager);
    let _ = printer.await;
    let report = report.map_err(|e| eyre!("{e:#}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report::print_report(&report);
    }

    finish(&report)
}

fn finish(report: &RunReport) -> Result<()> {
    if report.is_success() {
        Ok(())
    } else {
        Err(eyre!(
            "Run {} ended with status {:?}",
            report.machine_name,
            report.status
        ))
    }
}

/// Print progress events until the engine drops its sender.
async fn print_events(mut rx: mpsc::Receiver<Event>, verbose: bool) {
    while let Some(event) = rx.recv().await {
        if verbose {
            report::print_event(&event);
        }
    }
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.machines.is_empty() {
        println!("No machine definitions found");
        return Ok(());
    }

    let mut invalid = 0;
    for definition in &config.machines {
        match config.build_machine(&definition.name) {
            Some(Ok(machine)) => println!(
                "{} {} ({} states, {} transitions)",
                "OK".green().bold(),
                machine.name(),
                machine.states().len(),
                machine.transitions().len()
            ),
            Some(Err(e)) => {
                invalid += 1;
                println!("{} {}: {}", "INVALID".red().bold(), definition.name, e);
            }
            None => {}
        }
    }

    if invalid > 0 {
        Err(eyre!("{} invalid machine definition(s)", invalid))
    } else {
        Ok(())
    }
}

fn list(config: &AppConfig) {
    if config.machines.is_empty() {
        println!("No machine definitions found");
        return;
    }

    for definition in &config.machines {
        let start: Vec<&str> = definition
            .states
            .iter()
            .filter(|s| s.start)
            .map(|s| s.id.as_str())
            .collect();
        println!("{}", definition.name.bold());
        println!("  States: {}", definition.states.len());
        println!("  Transitions: {}", definition.transitions.len());
        println!("  Start: {}", start.join(", "));
    }
}
