//! Started tasks.

use crate::dragen::ExternalProcessRunner;
use crate::tasks::metrics::DemultiplexMetricsTask;
use crate::tasks::process::ProcessTask;
use crate::tasks::wait_for_file::WaitForFileTask;
use crate::tasks::{Pollable, Runnable};
use sf_protocol::task_models::{TaskDefinition, TaskKind, TaskResult};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinHandle;

enum Worker {
    /// Checked from the engine loop on every poll.
    File(WaitForFileTask),

    /// Checked from the engine loop; finishes on its first poll.
    Metrics(DemultiplexMetricsTask),

    /// Running on its own tokio task, reporting through `rx`.
    Process {
        rx: oneshot::Receiver<TaskResult>,
        join: JoinHandle<()>,
    },

    /// Cancelled before it reported.
    Aborted,
}

/// A task that has been started.
///
/// Polling is non-blocking and idempotent: the first observed result is
/// cached and every later poll returns it unchanged without touching the
/// worker again.
pub struct TaskHandle {
    name: String,
    worker: Worker,
    result: Option<TaskResult>,
}

impl TaskHandle {
    /// Start `definition`.
    ///
    /// Process tasks are spawned immediately on the current tokio runtime, so
    /// this must be called from within one.
    pub fn start(definition: &TaskDefinition, runner: Arc<dyn ExternalProcessRunner>) -> Self {
        let worker = match &definition.kind {
            TaskKind::WaitForFile { path } => Worker::File(WaitForFileTask::new(path.clone())),
            TaskKind::Demultiplex(params) => {
                spawn_process(ProcessTask::Demultiplex(params.clone()), runner)
            }
            TaskKind::Alignment(params) => {
                spawn_process(ProcessTask::Alignment(params.clone()), runner)
            }
            TaskKind::DemultiplexMetrics { stats_file } => {
                Worker::Metrics(DemultiplexMetricsTask::new(stats_file.clone()))
            }
        };

        Self {
            name: definition.name.clone(),
            worker,
            result: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check for a result without blocking.
    pub fn poll(&mut self) -> Option<TaskResult> {
        if self.result.is_none() {
            self.result = match &mut self.worker {
                Worker::File(task) => task.poll(),
                Worker::Metrics(task) => task.poll(),
                Worker::Process { rx, .. } => match rx.try_recv() {
                    Ok(result) => Some(result),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Closed) => Some(TaskResult::failure(
                        -1,
                        "Worker exited without reporting a result",
                    )),
                },
                Worker::Aborted => None,
            };
        }
        self.result.clone()
    }

    /// The cached result, if one has been observed.
    pub fn result(&self) -> Option<&TaskResult> {
        self.result.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    /// Cancel the worker if it has not reported yet.
    ///
    /// An aborted handle never produces a result.
    pub fn abort(&mut self) {
        if self.result.is_some() {
            return;
        }
        if let Worker::Process { join, .. } = &self.worker {
            join.abort();
        }
        self.worker = Worker::Aborted;
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let worker = match &self.worker {
            Worker::File(task) => format!("File({})", task.path().display()),
            Worker::Metrics(task) => format!("Metrics({})", task.stats_file().display()),
            Worker::Process { .. } => "Process".to_string(),
            Worker::Aborted => "Aborted".to_string(),
        };
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("worker", &worker)
            .field("result", &self.result)
            .finish()
    }
}

fn spawn_process(task: ProcessTask, runner: Arc<dyn ExternalProcessRunner>) -> Worker {
    let (tx, rx) = oneshot::channel();
    let join = tokio::spawn(async move {
        let result = task.run(runner.as_ref()).await;
        let _ = tx.send(result);
    });
    Worker::Process { rx, join }
}
