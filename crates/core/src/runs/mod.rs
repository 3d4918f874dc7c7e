//! Background run management.

pub mod manager;

pub use manager::RunManager;
