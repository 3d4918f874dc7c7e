//! Run manager for coordinating multiple state machine runs.
//!
//! The RunManager starts runs in the background, keeps a registry of them
//! keyed by run id, and provides stop and wait operations. The CLI uses it to
//! turn Ctrl-C into a graceful stop and to apply the run timeout.

use crate::engine::{abandoned_report, FiniteStateMachineEngine};
use crate::machine::StateMachine;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sf_protocol::report_models::{MachineStatus, RunReport};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct RunEntry {
    machine: Arc<StateMachine>,
    stop: CancellationToken,
    /// Taken by the caller of [`RunManager::wait`].
    handle: Option<JoinHandle<RunReport>>,
    started_at: DateTime<Utc>,
}

/// Manages background state machine runs.
pub struct RunManager {
    engine: FiniteStateMachineEngine,

    /// Registry of runs that have not been waited on yet.
    runs: Arc<Mutex<HashMap<Uuid, RunEntry>>>,
}

impl RunManager {
    pub fn new(engine: FiniteStateMachineEngine) -> Self {
        Self {
            engine,
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start running `machine` in the background.
    ///
    /// The returned id is the run's `machine_id`, the same id found in its
    /// events and in its final report.
    pub async fn start(&self, machine: Arc<StateMachine>) -> Uuid {
        let id = Uuid::new_v4();
        let stop = CancellationToken::new();

        let engine = self.engine.clone();
        let token = stop.clone();
        let run_machine = Arc::clone(&machine);
        let handle = tokio::spawn(async move { engine.run_as(id, &run_machine, token).await });

        tracing::debug!(run = %id, machine = machine.name(), "Run registered");
        self.runs.lock().await.insert(
            id,
            RunEntry {
                machine,
                stop,
                handle: Some(handle),
                started_at: Utc::now(),
            },
        );
        id
    }

    /// Ask a run to stop.
    ///
    /// The run stops at its next pass boundary and reports
    /// [`MachineStatus::Stopped`]; collect the report with [`wait`](Self::wait).
    ///
    /// # Errors
    ///
    /// Returns an error if the run is not found.
    pub async fn stop(&self, id: Uuid) -> Result<()> {
        let runs = self.runs.lock().await;
        let entry = runs.get(&id).ok_or_else(|| anyhow!("Run {} not found", id))?;
        entry.stop.cancel();
        Ok(())
    }

    /// Ask every registered run to stop.
    pub async fn stop_all(&self) {
        for entry in self.runs.lock().await.values() {
            entry.stop.cancel();
        }
    }

    /// Wait for a run to finish and remove it from the registry.
    ///
    /// The run stays registered while it is being waited on, so it can still
    /// be stopped from elsewhere. If it is still going after `timeout`, it is
    /// stopped and its partial report is returned with status
    /// [`MachineStatus::TimedOut`].
    ///
    /// # Errors
    ///
    /// Returns an error if the run is not found or is already being waited on.
    pub async fn wait(&self, id: Uuid, timeout: Duration) -> Result<RunReport> {
        let (mut handle, stop) = {
            let mut runs = self.runs.lock().await;
            let entry = runs
                .get_mut(&id)
                .ok_or_else(|| anyhow!("Run {} not found", id))?;
            let handle = entry
                .handle
                .take()
                .ok_or_else(|| anyhow!("Run {} is already being waited on", id))?;
            (handle, entry.stop.clone())
        };

        let joined = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(run = %id, "Run timed out; stopping");
                stop.cancel();
                handle.await.map(|mut report| {
                    if report.status == MachineStatus::Stopped {
                        report.status = MachineStatus::TimedOut;
                    }
                    report
                })
            }
        };

        let entry = self
            .runs
            .lock()
            .await
            .remove(&id)
            .ok_or_else(|| anyhow!("Run {} not found", id))?;

        Ok(joined.unwrap_or_else(|e| {
            tracing::error!(run = %id, error = %e, "Engine task failed");
            abandoned_report(id, &entry.machine, self.engine.runner(), entry.started_at)
        }))
    }

    /// Whether a registered run is still evaluating passes.
    ///
    /// A run that is being waited on counts as running.
    pub async fn is_running(&self, id: Uuid) -> bool {
        self.runs
            .lock()
            .await
            .get(&id)
            .is_some_and(|entry| entry.handle.as_ref().map_or(true, |h| !h.is_finished()))
    }

    /// Number of registered runs, finished or not.
    pub async fn run_count(&self) -> usize {
        self.runs.lock().await.len()
    }

    /// Ids of all registered runs.
    pub async fn run_ids(&self) -> Vec<Uuid> {
        self.runs.lock().await.keys().copied().collect()
    }
}
