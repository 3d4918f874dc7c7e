//! Errors raised while loading the `.seqflow/` directory.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// `config.toml` is not valid TOML or does not match [`GlobalConfig`].
    ///
    /// [`GlobalConfig`]: sf_protocol::config_models::GlobalConfig
    #[error("Invalid global settings in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A machine file is not a valid [`MachineDefinition`].
    ///
    /// [`MachineDefinition`]: sf_protocol::machine_models::MachineDefinition
    #[error("Invalid machine definition in {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Cannot list machine definitions in {path}: {source}")]
    DirectoryWalk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Parsed, but unusable.
    #[error("Invalid configuration in {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
