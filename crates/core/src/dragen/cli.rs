//! Runner that invokes the real Dragen command line.

use crate::dragen::base::ExternalProcessRunner;
use crate::tasks::ProcessTask;
use async_trait::async_trait;
use sf_protocol::task_models::TaskResult;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

#[derive(Debug, Clone, Copy)]
enum Channel {
    Stdout,
    Stderr,
}

/// Spawns the configured program directly with the task's arguments.
///
/// No shell is involved: every argument reaches the program as a single argv
/// entry, whatever spaces or metacharacters it contains. Output lines are forwarded to `tracing` as they arrive; the exit status
/// becomes the task result. The child is killed if the worker running it is
/// aborted.
#[derive(Debug, Clone)]
pub struct DragenCli {
    program: String,
    working_dir: Option<PathBuf>,
}

impl DragenCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Whether the configured program can be found on `PATH`.
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }
}

#[async_trait]
impl ExternalProcessRunner for DragenCli {
    async fn execute(&self, command_line: &str, task: &ProcessTask) -> TaskResult {
        tracing::info!(task = task.label(), %command_line, "Launching Dragen");

        let mut cmd = Command::new(&self.program);
        cmd.args(task.args());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(program = %self.program, error = %e, "Failed to spawn");
                return TaskResult::failure(-1, format!("Failed to spawn '{}': {}", self.program, e));
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill().await;
            return TaskResult::failure(-1, "Failed to capture process output");
        };

        let stdout = LinesStream::new(BufReader::new(stdout).lines()).map(|l| (Channel::Stdout, l));
        let stderr = LinesStream::new(BufReader::new(stderr).lines()).map(|l| (Channel::Stderr, l));
        let mut output = stdout.merge(stderr);

        while let Some((channel, line)) = output.next().await {
            match (channel, line) {
                (Channel::Stdout, Ok(line)) => tracing::debug!(task = task.label(), "{}", line),
                (Channel::Stderr, Ok(line)) => tracing::warn!(task = task.label(), "{}", line),
                (_, Err(e)) => {
                    tracing::warn!(task = task.label(), error = %e, "Failed to read process output");
                }
            }
        }

        match child.wait().await {
            Ok(status) => match status.code() {
                Some(0) => TaskResult::success("Success"),
                Some(code) => TaskResult::failure(code, format!("Exited with code {code}")),
                None => TaskResult::failure(-1, "Terminated by signal"),
            },
            Err(e) => TaskResult::failure(-1, format!("Failed to wait for process: {e}")),
        }
    }

    fn program(&self) -> &str {
        &self.program
    }
}
