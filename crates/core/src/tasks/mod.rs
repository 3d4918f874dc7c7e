//! Task capabilities and started-task handles.
//!
//! A task either is [`Pollable`] (checked from the engine loop, never
//! blocking) or [`Runnable`] (long-running, executed on its own worker).
//! [`TaskHandle`] wraps either kind once the engine has started it.

pub mod handle;
pub mod metrics;
pub mod process;
pub mod wait_for_file;

use crate::dragen::ExternalProcessRunner;
use async_trait::async_trait;
use sf_protocol::task_models::TaskResult;

pub use handle::TaskHandle;
pub use metrics::DemultiplexMetricsTask;
pub use process::ProcessTask;
pub use wait_for_file::WaitForFileTask;

/// A task whose completion is observed by polling.
pub trait Pollable {
    /// Returns `None` while the task is still outstanding.
    fn poll(&mut self) -> Option<TaskResult>;
}

/// A task that runs to completion through the external process runner.
#[async_trait]
pub trait Runnable: Send + Sync {
    /// Run the task.
    ///
    /// Failures, including I/O errors, are reported as a failing
    /// [`TaskResult`] rather than an error.
    async fn run(&self, runner: &dyn ExternalProcessRunner) -> TaskResult;
}
