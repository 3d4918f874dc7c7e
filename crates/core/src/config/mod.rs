//! Configuration loading and management.
//!
//! This module loads and parses all configuration files from the
//! `.seqflow/` directory structure.

pub mod error;
pub mod loader;
pub mod models;
