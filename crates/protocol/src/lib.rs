//! # sf-protocol
//!
//! Shared data models for seqflow.
//!
//! This crate defines all serializable data structures used for:
//! - Machine definition files (YAML states, transitions and tasks)
//! - Global configuration (`config.toml`)
//! - Task results and run reports
//! - Engine events
//!
//! ## Modules
//!
//! - [`task_models`]: Task definitions, task kinds and results
//! - [`machine_models`]: State machine definitions
//! - [`report_models`]: Run reports and engine-level statuses
//! - [`config_models`]: Global configuration from config.toml
//! - [`ipc`]: Events emitted by the engine
//!
//! ## Design Principles
//!
//! - Minimal dependencies: serde, ts-rs, uuid and chrono
//! - TypeScript generation: All types derive `TS` for client compatibility
//! - Independent compilation: No dependencies on other seqflow crates

pub mod config_models;
pub mod ipc;
pub mod machine_models;
pub mod report_models;
pub mod task_models;

// Re-export all public types for convenience
pub use config_models::*;
pub use ipc::*;
pub use machine_models::*;
pub use report_models::*;
pub use task_models::*;
