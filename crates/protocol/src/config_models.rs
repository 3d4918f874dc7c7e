//! Global configuration models for `.seqflow/config.toml`.
//!
//! This module defines the structure of the global configuration file that
//! controls engine cadence, graph validation and the Dragen runner.

use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;
use ts_rs::TS;

/// Which Dragen runner implementation to use.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "kebab-case")]
pub enum RunnerMode {
    /// Deterministic emulation that writes the expected artifacts.
    #[default]
    Simulator,

    /// Invoke the real Dragen command line.
    Cli,
}

/// Settings for the external Dragen tool.
///
/// # Example
///
/// ```toml
/// [dragen]
/// mode = "cli"
/// program = "/opt/edico/bin/dragen"
/// output-root = "/seq/dragen"
/// intermediate-results = "/staging/intermediate"
/// reference = "/staging/reference/hg38/v3.7.8"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct DragenConfig {
    #[serde(default)]
    pub mode: RunnerMode,

    /// Binary placed at the front of every command line.
    #[serde(default = "default_program")]
    pub program: String,

    /// Root directory for demultiplex and alignment output.
    #[serde(default = "default_output_root")]
    #[ts(type = "string")]
    pub output_root: PathBuf,

    /// Scratch directory for Dragen intermediate results.
    #[serde(default = "default_intermediate_results")]
    #[ts(type = "string")]
    pub intermediate_results: PathBuf,

    /// Reference genome used for alignment.
    #[serde(default = "default_reference")]
    #[ts(type = "string")]
    pub reference: PathBuf,
}

fn default_program() -> String {
    "dragen".to_string()
}

fn default_output_root() -> PathBuf {
    PathBuf::from("dragen")
}

fn default_intermediate_results() -> PathBuf {
    PathBuf::from("/staging/intermediate")
}

fn default_reference() -> PathBuf {
    PathBuf::from("/staging/reference/hg38")
}

impl Default for DragenConfig {
    fn default() -> Self {
        Self {
            mode: RunnerMode::default(),
            program: default_program(),
            output_root: default_output_root(),
            intermediate_results: default_intermediate_results(),
            reference: default_reference(),
        }
    }
}

/// Represents global settings from `.seqflow/config.toml`.
///
/// # Example
///
/// ```toml
/// # .seqflow/config.toml
/// poll-interval-ms = 500
/// allow-cycles = false
/// run-timeout-secs = 3600
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct GlobalConfig {
    /// Delay between two evaluation passes of the engine.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Accept cyclic machine definitions.
    ///
    /// The engine fires each transition at most once, so a cycle never
    /// loops; it is rejected by default because it usually signals a
    /// mistake in the definition.
    #[serde(default)]
    pub allow_cycles: bool,

    /// Deadline applied by the CLI to a single run.
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,

    #[serde(default)]
    pub dragen: DragenConfig,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_run_timeout_secs() -> u64 {
    86_400
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            allow_cycles: false,
            run_timeout_secs: default_run_timeout_secs(),
            dragen: DragenConfig::default(),
        }
    }
}
