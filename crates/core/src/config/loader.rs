//! Configuration file loader for the `.seqflow/` directory structure.
//!
//! This module loads and parses all configuration files from the
//! `.seqflow/` directory:
//! - `config.toml`: Global settings
//! - `machines/*.yaml`: State machine definitions

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use sf_protocol::config_models::GlobalConfig;
use sf_protocol::machine_models::MachineDefinition;
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

/// Name of the configuration directory under a project root.
pub const CONFIG_DIR: &str = ".seqflow";

/// Loads all configuration from the `.seqflow/` directory.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.seqflow/` folder
///
/// # Returns
///
/// An `AppConfig` containing all loaded configuration. If the directory or
/// individual files are missing, defaults are used rather than an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - Files exist but cannot be read
/// - Files have invalid TOML or YAML syntax
/// - Values are unusable (zero poll interval, duplicate machine names)
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let sf_dir = root.join(CONFIG_DIR);

    if !sf_dir.exists() {
        return Ok(AppConfig::default());
    }

    let global = load_global_config(&sf_dir)?;
    let machines = load_machines(&sf_dir)?;

    Ok(AppConfig { global, machines })
}

/// Loads global configuration from `config.toml`.
fn load_global_config(sf_dir: &Path) -> ConfigResult<GlobalConfig> {
    let config_path = sf_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(GlobalConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: GlobalConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.clone(),
            source,
        })?;

    if config.poll_interval_ms == 0 {
        return Err(ConfigError::InvalidConfig {
            path: config_path,
            reason: "poll-interval-ms must be greater than zero".to_string(),
        });
    }

    Ok(config)
}

/// Loads all machine definitions from `machines/*.yaml` and `machines/*.yml`.
fn load_machines(sf_dir: &Path) -> ConfigResult<Vec<MachineDefinition>> {
    let machines_dir = sf_dir.join("machines");

    if !machines_dir.exists() {
        return Ok(Vec::new());
    }

    let mut machines: Vec<MachineDefinition> = Vec::new();
    let mut names = HashSet::new();

    for entry in WalkDir::new(&machines_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: machines_dir.clone(),
            source,
        })?;

        let path = entry.path();

        let ext = path.extension().and_then(|s| s.to_str());
        if ext != Some("yaml") && ext != Some("yml") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let machine: MachineDefinition =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?;

        if !names.insert(machine.name.clone()) {
            return Err(ConfigError::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!("machine '{}' is defined more than once", machine.name),
            });
        }

        tracing::debug!(machine = %machine.name, path = %path.display(), "Loaded machine definition");
        machines.push(machine);
    }

    machines.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(machines)
}
