//! Configuration models that aggregate all settings.
//!
//! This module provides the unified `AppConfig` structure that combines
//! global settings and machine definitions into a single configuration
//! object.

use crate::machine::{CyclePolicy, GraphResult, StateMachine};
use sf_protocol::config_models::GlobalConfig;
use sf_protocol::machine_models::MachineDefinition;
use std::time::Duration;

/// Unified application configuration loaded from the `.seqflow/` directory.
///
/// - `config.toml`: Global settings
/// - `machines/*.yaml`: State machine definitions
///
/// # Example
///
/// ```rust,no_run
/// use sf_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} machines", config.machines.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Global settings from `config.toml`.
    pub global: GlobalConfig,

    /// Machine definitions from `machines/*.yaml`, sorted by name.
    pub machines: Vec<MachineDefinition>,
}

impl AppConfig {
    pub fn machine(&self, name: &str) -> Option<&MachineDefinition> {
        self.machines.iter().find(|m| m.name == name)
    }

    pub fn cycle_policy(&self) -> CyclePolicy {
        CyclePolicy::from_allow_cycles(self.global.allow_cycles)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.global.run_timeout_secs)
    }

    /// Validate and build the named machine definition.
    ///
    /// Returns `None` when no definition has that name.
    pub fn build_machine(&self, name: &str) -> Option<GraphResult<StateMachine>> {
        self.machine(name)
            .map(|definition| StateMachine::from_definition(definition, self.cycle_policy()))
    }
}
