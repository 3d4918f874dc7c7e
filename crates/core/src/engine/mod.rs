//! State machine execution engine.
//!
//! The FiniteStateMachineEngine drives a [`StateMachine`] in passes. Each
//! pass polls every running task once, starts exit tasks of states whose
//! entry task succeeded, and fires every eligible transition (repeating until
//! nothing more fires). The run ends when a pass leaves no task running.

mod runtime;

use crate::dragen::ExternalProcessRunner;
use crate::machine::StateMachine;
use chrono::Utc;
use runtime::Runtime;
use sf_protocol::config_models::GlobalConfig;
use sf_protocol::ipc::Event;
use sf_protocol::report_models::{MachineStatus, RunReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default delay between two passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The pass-based state machine engine.
///
/// The engine holds no per-run state and can drive any number of machines,
/// sequentially or concurrently.
#[derive(Clone)]
pub struct FiniteStateMachineEngine {
    runner: Arc<dyn ExternalProcessRunner>,
    poll_interval: Duration,
    events_tx: Option<Sender<Event>>,
}

impl FiniteStateMachineEngine {
    /// Create an engine that hands process tasks to `runner`.
    pub fn new(runner: Arc<dyn ExternalProcessRunner>) -> Self {
        Self {
            runner,
            poll_interval: DEFAULT_POLL_INTERVAL,
            events_tx: None,
        }
    }

    /// Create an engine using the cadence from `config`.
    pub fn from_config(runner: Arc<dyn ExternalProcessRunner>, config: &GlobalConfig) -> Self {
        Self::new(runner).with_poll_interval(Duration::from_millis(config.poll_interval_ms))
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Send progress events to `events_tx`.
    ///
    /// Events are sent with backpressure while the run is live. Once the run
    /// is stopped, events that do not fit in the channel are dropped with a
    /// warning, so an undrained receiver cannot keep a stopped run alive.
    pub fn with_events(mut self, events_tx: Sender<Event>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn runner(&self) -> Arc<dyn ExternalProcessRunner> {
        Arc::clone(&self.runner)
    }

    /// Run `machine` until it is quiescent or `stop` is cancelled.
    ///
    /// There is no internal deadline; see [`run_to_completion`](Self::run_to_completion).
    pub async fn run(&self, machine: &StateMachine, stop: CancellationToken) -> RunReport {
        self.run_as(Uuid::new_v4(), machine, stop).await
    }

    /// Like [`run`](Self::run), with a caller-chosen run id.
    pub async fn run_as(
        &self,
        machine_id: Uuid,
        machine: &StateMachine,
        stop: CancellationToken,
    ) -> RunReport {
        let started_at = Utc::now();
        tracing::info!(machine = machine.name(), %machine_id, "Starting state machine");
        self.emit(
            vec![Event::MachineStarted {
                machine_id,
                machine_name: machine.name().to_string(),
            }],
            &stop,
        )
        .await;

        let mut runtime = Runtime::new(machine_id, machine, Arc::clone(&self.runner));
        runtime.activate_start_states(machine);
        self.emit(runtime.take_events(), &stop).await;

        let mut passes: u64 = 0;
        let status = loop {
            if stop.is_cancelled() {
                tracing::info!(machine = machine.name(), passes, "Stop requested");
                runtime.abort_running();
                break MachineStatus::Stopped;
            }

            passes += 1;
            tracing::debug!(machine = machine.name(), pass = passes, "Evaluating pass");

            runtime.poll_running(machine);
            runtime.advance(machine);
            self.emit(runtime.take_events(), &stop).await;

            if !runtime.has_running() {
                break if runtime.any_failed() {
                    MachineStatus::Failed
                } else {
                    MachineStatus::Completed
                };
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = stop.cancelled() => {}
            }
        };

        tracing::info!(machine = machine.name(), ?status, passes, "State machine finished");
        self.emit(vec![Event::MachineFinished { machine_id, status }], &stop)
            .await;

        runtime.report(machine, status, passes, started_at)
    }

    /// Run `machine` on its own task, giving up after `timeout`.
    ///
    /// When the deadline passes the run is stopped and its partial report is
    /// returned with status [`MachineStatus::TimedOut`].
    pub async fn run_to_completion(
        &self,
        machine: Arc<StateMachine>,
        timeout: Duration,
    ) -> RunReport {
        let machine_id = Uuid::new_v4();
        let stop = CancellationToken::new();
        let started_at = Utc::now();

        let engine = self.clone();
        let token = stop.clone();
        let run_machine = Arc::clone(&machine);
        let mut handle =
            tokio::spawn(async move { engine.run_as(machine_id, &run_machine, token).await });

        let joined = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(
                    machine = machine.name(),
                    timeout_secs = timeout.as_secs_f64(),
                    "Run timed out; stopping"
                );
                stop.cancel();
                handle.await.map(|mut report| {
                    if report.status == MachineStatus::Stopped {
                        report.status = MachineStatus::TimedOut;
                    }
                    report
                })
            }
        };

        joined.unwrap_or_else(|e| {
            tracing::error!(machine = machine.name(), error = %e, "Engine task failed");
            abandoned_report(machine_id, &machine, self.runner(), started_at)
        })
    }

    async fn emit(&self, events: Vec<Event>, stop: &CancellationToken) {
        let Some(tx) = &self.events_tx else {
            return;
        };
        let mut events = events.into_iter();
        while let Some(event) = events.next() {
            let event = match tx.try_send(event) {
                Ok(()) => continue,
                Err(TrySendError::Closed(_)) => return,
                Err(TrySendError::Full(event)) => event,
            };
            tokio::select! {
                sent = tx.send(event) => {
                    if sent.is_err() {
                        return;
                    }
                }
                _ = stop.cancelled() => {
                    tracing::warn!(
                        dropped = events.len() + 1,
                        "Event receiver is full after stop; dropping events"
                    );
                    return;
                }
            }
        }
    }
}

/// Report for a run whose engine task died without producing one.
pub(crate) fn abandoned_report(
    machine_id: Uuid,
    machine: &StateMachine,
    runner: Arc<dyn ExternalProcessRunner>,
    started_at: chrono::DateTime<Utc>,
) -> RunReport {
    Runtime::new(machine_id, machine, runner).report(machine, MachineStatus::Failed, 0, started_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dragen::DragenSimulator;
    use crate::machine::StateMachineBuilder;
    use sf_protocol::machine_models::{StateDefinition, TransitionDefinition};
    use sf_protocol::report_models::{StateStatus, TransitionStatus};
    use sf_protocol::task_models::{TaskDefinition, TaskStatus};
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    fn engine() -> FiniteStateMachineEngine {
        FiniteStateMachineEngine::new(Arc::new(DragenSimulator::new()))
            .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_single_start_state_is_quiescent_after_one_pass() {
        let machine = StateMachineBuilder::new("single")
            .state(StateDefinition::new("Only").start())
            .build()
            .unwrap();

        let report = engine().run(&machine, CancellationToken::new()).await;

        assert_eq!(report.status, MachineStatus::Completed);
        assert_eq!(report.passes, 1);
        assert_eq!(report.states[0].status, StateStatus::Active);
        assert!(report.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_guard_waits_for_file() {
        let dir = tempdir().unwrap();
        let trigger = dir.path().join("RTAComplete.txt");
        let machine = StateMachineBuilder::new("guarded")
            .state(StateDefinition::new("A").start())
            .state(StateDefinition::new("B"))
            .transition(
                TransitionDefinition::new("A-B", "A", "B")
                    .guarded_by(TaskDefinition::wait_for_file("rta", &trigger)),
            )
            .build()
            .unwrap();

        let writer = tokio::spawn({
            let trigger = trigger.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(60)).await;
                std::fs::write(trigger, "").unwrap();
            }
        });

        let report = engine().run(&machine, CancellationToken::new()).await;
        writer.await.unwrap();

        assert_eq!(report.status, MachineStatus::Completed);
        assert!(report.passes > 2);
        assert_eq!(report.state("B").unwrap().status, StateStatus::Active);
        let guard = report.transition("A-B").unwrap().guard.as_ref().unwrap();
        assert_eq!(guard.status, TaskStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_stop_before_first_pass() {
        let machine = StateMachineBuilder::new("stopped")
            .state(StateDefinition::new("A").start())
            .build()
            .unwrap();
        let stop = CancellationToken::new();
        stop.cancel();

        let report = engine().run(&machine, stop).await;

        assert_eq!(report.status, MachineStatus::Stopped);
        assert_eq!(report.passes, 0);
        assert_eq!(report.states[0].status, StateStatus::Active);
    }

    #[tokio::test]
    async fn test_run_to_completion_times_out() {
        let dir = tempdir().unwrap();
        let machine = StateMachineBuilder::new("never")
            .state(StateDefinition::new("A").start())
            .state(StateDefinition::new("B"))
            .transition(TransitionDefinition::new("A-B", "A", "B").guarded_by(
                TaskDefinition::wait_for_file("never", dir.path().join("never")),
            ))
            .build()
            .unwrap();

        let report = engine()
            .run_to_completion(Arc::new(machine), Duration::from_millis(100))
            .await;

        assert_eq!(report.status, MachineStatus::TimedOut);
        assert!(!report.is_quiescent());
        assert_eq!(
            report.transition("A-B").unwrap().status,
            TransitionStatus::Guarding
        );
        assert_eq!(report.state("B").unwrap().status, StateStatus::Inactive);
    }

    #[tokio::test]
    async fn test_events_are_emitted_in_order() {
        let machine = StateMachineBuilder::new("events")
            .state(StateDefinition::new("A").start())
            .state(StateDefinition::new("B"))
            .transition(TransitionDefinition::new("A-B", "A", "B"))
            .build()
            .unwrap();
        let (tx, mut rx) = mpsc::channel(100);

        let report = engine()
            .with_events(tx)
            .run(&machine, CancellationToken::new())
            .await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert!(matches!(&events[0], Event::MachineStarted { machine_name, .. } if machine_name == "events"));
        assert!(matches!(&events[1], Event::StateActivated { state, .. } if state == "A"));
        assert!(matches!(&events[2], Event::TransitionFired { transition, .. } if transition == "A-B"));
        assert!(matches!(&events[3], Event::StateActivated { state, .. } if state == "B"));
        assert!(matches!(
            events.last(),
            Some(Event::MachineFinished {
                status: MachineStatus::Completed,
                ..
            })
        ));
        assert!(events.iter().all(|e| e.machine_id() == report.machine_id));
    }

    #[tokio::test]
    async fn test_undrained_events_do_not_block_timeout() {
        let dir = tempdir().unwrap();
        let machine = StateMachineBuilder::new("backlog")
            .state(StateDefinition::new("A").start())
            .state(StateDefinition::new("B"))
            .transition(TransitionDefinition::new("A-B", "A", "B").guarded_by(
                TaskDefinition::wait_for_file("never", dir.path().join("never")),
            ))
            .build()
            .unwrap();
        // Held open but never read: the second event already finds it full.
        let (tx, _rx) = mpsc::channel(1);

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            engine()
                .with_events(tx)
                .run_to_completion(Arc::new(machine), Duration::from_millis(100)),
        )
        .await
        .expect("run returns once its deadline passes");

        assert_eq!(report.status, MachineStatus::TimedOut);
    }

    #[test]
    fn test_from_config() {
        let config = GlobalConfig {
            poll_interval_ms: 250,
            ..GlobalConfig::default()
        };
        let engine = FiniteStateMachineEngine::from_config(Arc::new(DragenSimulator::new()), &config);

        assert_eq!(engine.poll_interval(), Duration::from_millis(250));
    }
}
