//! The external process runner capability.

use crate::tasks::ProcessTask;
use async_trait::async_trait;
use sf_protocol::task_models::TaskResult;

/// Executes a process task.
///
/// `command_line` is the display form from [`ProcessTask::command_line`],
/// for logging. Runners that spawn a real process take the arguments from
/// [`ProcessTask::args`] and never hand the line to a shell.
///
/// This is the only boundary between the engine and the real (or simulated)
/// Dragen tool. Implementations report every outcome, including failure to
/// launch, as a [`TaskResult`].
#[async_trait]
pub trait ExternalProcessRunner: Send + Sync {
    async fn execute(&self, command_line: &str, task: &ProcessTask) -> TaskResult;

    /// Binary placed at the front of every command line.
    fn program(&self) -> &str;
}
