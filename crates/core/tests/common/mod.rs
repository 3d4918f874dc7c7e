//! Common test utilities shared by the integration tests.
//!
//! - Fixtures: engines, machines, sequencing runs and sample records
//! - Assertions over run reports and event streams
//!
//! Each test binary uses a different subset of these helpers.

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
