//! # sf-core
//!
//! State machine engine and Dragen task orchestration for seqflow.
//!
//! This crate provides:
//! - The pipeline graph model and its validating builder
//! - Pollable and runnable tasks, and the Dragen runner capability
//! - The pass-based execution engine and background run management
//! - The standard sequencing-run pipeline factory
//! - Configuration loading from the `.seqflow/` directory
//!
//! ## Modules
//!
//! - [`machine`]: States, transitions and graph validation
//! - [`tasks`]: Task capabilities and started-task handles
//! - [`dragen`]: External process runner implementations
//! - [`engine`]: The state machine engine
//! - [`runs`]: Background run registry
//! - [`factory`]: Sequencing-run pipeline construction
//! - [`sample_sheet`]: Sample sheet reading and writing
//! - [`config`]: Configuration loading and management

pub mod config;
pub mod dragen;
pub mod engine;
pub mod factory;
pub mod machine;
pub mod runs;
pub mod sample_sheet;
pub mod tasks;
