//! Dragen runner implementations.
//!
//! Process tasks never launch anything themselves; they hand their command
//! line to an [`ExternalProcessRunner`]. Two implementations exist:
//!
//! - [`DragenCli`]: runs the real tool through the shell
//! - [`DragenSimulator`]: writes the expected artifacts without running anything

pub mod base;
pub mod cli;
pub mod simulator;

pub use base::ExternalProcessRunner;
pub use cli::DragenCli;
pub use simulator::DragenSimulator;

use sf_protocol::config_models::{DragenConfig, RunnerMode};
use std::sync::Arc;

/// Build the runner selected by `config.mode`.
pub fn runner_from_config(config: &DragenConfig) -> Arc<dyn ExternalProcessRunner> {
    match config.mode {
        RunnerMode::Simulator => Arc::new(DragenSimulator::new()),
        RunnerMode::Cli => {
            let cli = DragenCli::new(config.program.clone());
            if !cli.is_available() {
                tracing::warn!(program = %config.program, "Dragen program not found on PATH");
            }
            Arc::new(cli)
        }
    }
}
