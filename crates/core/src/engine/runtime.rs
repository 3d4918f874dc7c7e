//! Per-run bookkeeping for the engine.
//!
//! The [`StateMachine`] is immutable; everything that changes while it runs
//! (which states are active, which tasks have started, which transitions
//! have fired) lives here, indexed by the machine's arena ids.

use crate::dragen::ExternalProcessRunner;
use crate::machine::{StateId, StateMachine, TransitionId};
use crate::tasks::TaskHandle;
use chrono::{DateTime, Utc};
use sf_protocol::ipc::Event;
use sf_protocol::report_models::{
    MachineStatus, RunReport, StateReport, StateStatus, TaskReport, TransitionReport,
    TransitionStatus,
};
use sf_protocol::task_models::{TaskDefinition, TaskResult, TaskStatus};
use std::sync::Arc;
use uuid::Uuid;

/// Progress of one task slot.
#[derive(Debug)]
pub(crate) enum TaskProgress {
    NotStarted,
    Running(TaskHandle),
    Finished(TaskResult),
}

impl TaskProgress {
    fn is_running(&self) -> bool {
        matches!(self, TaskProgress::Running(_))
    }

    fn succeeded(&self) -> bool {
        matches!(self, TaskProgress::Finished(r) if r.is_success())
    }

    fn failed(&self) -> bool {
        matches!(self, TaskProgress::Finished(r) if !r.is_success())
    }

    fn report(&self, definition: &TaskDefinition) -> TaskReport {
        let (status, result) = match self {
            TaskProgress::NotStarted => (TaskStatus::NotStarted, None),
            TaskProgress::Running(_) => (TaskStatus::Running, None),
            TaskProgress::Finished(r) if r.is_success() => (TaskStatus::Succeeded, Some(r.clone())),
            TaskProgress::Finished(r) => (TaskStatus::Failed, Some(r.clone())),
        };
        TaskReport {
            name: definition.name.clone(),
            status,
            result,
        }
    }
}

/// True when the slot is absent or its task succeeded.
fn done(slot: &Option<TaskProgress>) -> bool {
    slot.as_ref().map_or(true, TaskProgress::succeeded)
}

#[derive(Debug)]
struct StateRuntime {
    active: bool,
    on_enter: Option<TaskProgress>,
    on_exit: Option<TaskProgress>,
}

impl StateRuntime {
    fn slots(&self) -> impl Iterator<Item = &TaskProgress> {
        self.on_enter.iter().chain(self.on_exit.iter())
    }

    /// Active with every attached task succeeded.
    fn is_ready(&self) -> bool {
        self.active && done(&self.on_enter) && done(&self.on_exit)
    }

    fn status(&self) -> StateStatus {
        if !self.active {
            StateStatus::Inactive
        } else if self.slots().any(TaskProgress::failed) {
            StateStatus::Failed
        } else if self.slots().next().is_some() && self.slots().all(TaskProgress::succeeded) {
            StateStatus::Completed
        } else {
            StateStatus::Active
        }
    }
}

/// What a transition evaluation decided.
enum Step {
    Wait,
    StartGuard,
    Block(String),
    Fire,
}

#[derive(Debug)]
struct TransitionRuntime {
    status: TransitionStatus,
    guard: Option<TaskProgress>,
}

/// Mutable state of one engine run.
pub(crate) struct Runtime {
    machine_id: Uuid,
    runner: Arc<dyn ExternalProcessRunner>,
    states: Vec<StateRuntime>,
    transitions: Vec<TransitionRuntime>,
    /// Events produced since the last drain.
    events: Vec<Event>,
}

impl Runtime {
    pub(crate) fn new(
        machine_id: Uuid,
        machine: &StateMachine,
        runner: Arc<dyn ExternalProcessRunner>,
    ) -> Self {
        let states = machine
            .states()
            .iter()
            .map(|s| StateRuntime {
                active: false,
                on_enter: s.on_enter().map(|_| TaskProgress::NotStarted),
                on_exit: s.on_exit().map(|_| TaskProgress::NotStarted),
            })
            .collect();
        let transitions = machine
            .transitions()
            .iter()
            .map(|t| TransitionRuntime {
                status: TransitionStatus::Pending,
                guard: t.guard().map(|_| TaskProgress::NotStarted),
            })
            .collect();

        Self {
            machine_id,
            runner,
            states,
            transitions,
            events: Vec::new(),
        }
    }

    pub(crate) fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Activate every start state.
    pub(crate) fn activate_start_states(&mut self, machine: &StateMachine) {
        for state in machine.start_states() {
            self.activate(machine, state.id());
        }
    }

    fn activate(&mut self, machine: &StateMachine, id: StateId) {
        if self.states[id.index()].active {
            return;
        }
        self.states[id.index()].active = true;

        let state = machine.state(id);
        tracing::info!(machine = machine.name(), state = state.name(), "State activated");
        self.events.push(Event::StateActivated {
            machine_id: self.machine_id,
            state: state.name().to_string(),
        });

        if let Some(definition) = state.on_enter() {
            let handle = self.start_task(state.name(), definition);
            self.states[id.index()].on_enter = Some(TaskProgress::Running(handle));
        }
    }

    fn start_task(&mut self, owner: &str, definition: &TaskDefinition) -> TaskHandle {
        tracing::info!(
            owner,
            task = %definition.name,
            kind = definition.kind.label(),
            "Starting task"
        );
        self.events.push(Event::TaskStarted {
            machine_id: self.machine_id,
            owner: owner.to_string(),
            task: definition.name.clone(),
        });
        TaskHandle::start(definition, Arc::clone(&self.runner))
    }

    /// Poll every running task exactly once.
    ///
    /// All observations are taken before any state or transition is
    /// re-evaluated, so one pass works from a single snapshot.
    pub(crate) fn poll_running(&mut self, machine: &StateMachine) {
        let machine_id = self.machine_id;
        let mut finished = Vec::new();

        for (i, state) in self.states.iter_mut().enumerate() {
            let owner = machine.states()[i].name();
            for slot in [&mut state.on_enter, &mut state.on_exit].into_iter().flatten() {
                if let Some(event) = poll_slot(machine_id, owner, slot) {
                    finished.push(event);
                }
            }
        }
        for (i, transition) in self.transitions.iter_mut().enumerate() {
            let owner = machine.transitions()[i].name();
            if let Some(slot) = transition.guard.as_mut() {
                if let Some(event) = poll_slot(machine_id, owner, slot) {
                    finished.push(event);
                }
            }
        }

        self.events.extend(finished);
    }

    /// Start exit tasks and fire transitions until nothing changes.
    pub(crate) fn advance(&mut self, machine: &StateMachine) {
        loop {
            self.start_exit_tasks(machine);

            let mut fired = false;
            for transition in machine.transitions() {
                fired |= self.evaluate(machine, transition.id());
            }
            if !fired {
                break;
            }
        }
    }

    fn start_exit_tasks(&mut self, machine: &StateMachine) {
        for state in machine.states() {
            let runtime = &self.states[state.id().index()];
            let eligible = runtime.active
                && done(&runtime.on_enter)
                && matches!(runtime.on_exit, Some(TaskProgress::NotStarted));
            if !eligible {
                continue;
            }
            if let Some(definition) = state.on_exit() {
                let handle = self.start_task(state.name(), definition);
                self.states[state.id().index()].on_exit = Some(TaskProgress::Running(handle));
            }
        }
    }

    /// Evaluate one transition; returns true when it fired.
    fn evaluate(&mut self, machine: &StateMachine, id: TransitionId) -> bool {
        let transition = machine.transition(id);
        let runtime = &self.transitions[id.index()];
        if matches!(runtime.status, TransitionStatus::Fired | TransitionStatus::Blocked) {
            return false;
        }
        if !self.states[transition.from().index()].is_ready() {
            return false;
        }

        let step = match &runtime.guard {
            None => Step::Fire,
            Some(TaskProgress::NotStarted) => Step::StartGuard,
            Some(TaskProgress::Running(_)) => Step::Wait,
            Some(TaskProgress::Finished(result)) if result.is_success() => Step::Fire,
            Some(TaskProgress::Finished(result)) => Step::Block(format!(
                "Guard failed with exit code {}: {}",
                result.exit_code, result.status
            )),
        };

        match step {
            Step::Wait => false,
            Step::StartGuard => {
                if let Some(definition) = transition.guard() {
                    let handle = self.start_task(transition.name(), definition);
                    let runtime = &mut self.transitions[id.index()];
                    runtime.guard = Some(TaskProgress::Running(handle));
                    runtime.status = TransitionStatus::Guarding;
                }
                false
            }
            Step::Block(reason) => {
                tracing::warn!(transition = transition.name(), %reason, "Transition blocked");
                self.transitions[id.index()].status = TransitionStatus::Blocked;
                self.events.push(Event::TransitionBlocked {
                    machine_id: self.machine_id,
                    transition: transition.name().to_string(),
                    reason,
                });
                false
            }
            Step::Fire => {
                tracing::info!(
                    transition = transition.name(),
                    from = machine.state(transition.from()).name(),
                    to = machine.state(transition.to()).name(),
                    "Transition fired"
                );
                self.transitions[id.index()].status = TransitionStatus::Fired;
                self.events.push(Event::TransitionFired {
                    machine_id: self.machine_id,
                    transition: transition.name().to_string(),
                });
                self.activate(machine, transition.to());
                true
            }
        }
    }

    fn slots(&self) -> impl Iterator<Item = &TaskProgress> {
        self.states
            .iter()
            .flat_map(StateRuntime::slots)
            .chain(self.transitions.iter().filter_map(|t| t.guard.as_ref()))
    }

    pub(crate) fn has_running(&self) -> bool {
        self.slots().any(TaskProgress::is_running)
    }

    pub(crate) fn any_failed(&self) -> bool {
        self.slots().any(TaskProgress::failed)
    }

    /// Cancel every task that has not reported yet.
    pub(crate) fn abort_running(&mut self) {
        let slots = self
            .states
            .iter_mut()
            .flat_map(|s| [&mut s.on_enter, &mut s.on_exit])
            .chain(self.transitions.iter_mut().map(|t| &mut t.guard))
            .flatten();
        for slot in slots {
            if let TaskProgress::Running(handle) = slot {
                handle.abort();
            }
        }
    }

    pub(crate) fn report(
        &self,
        machine: &StateMachine,
        status: MachineStatus,
        passes: u64,
        started_at: DateTime<Utc>,
    ) -> RunReport {
        let states = machine
            .states()
            .iter()
            .zip(&self.states)
            .map(|(state, runtime)| StateReport {
                id: state.name().to_string(),
                label: state.label().to_string(),
                status: runtime.status(),
                on_enter: state
                    .on_enter()
                    .zip(runtime.on_enter.as_ref())
                    .map(|(def, slot)| slot.report(def)),
                on_exit: state
                    .on_exit()
                    .zip(runtime.on_exit.as_ref())
                    .map(|(def, slot)| slot.report(def)),
            })
            .collect();

        let transitions = machine
            .transitions()
            .iter()
            .zip(&self.transitions)
            .map(|(transition, runtime)| TransitionReport {
                id: transition.name().to_string(),
                from: machine.state(transition.from()).name().to_string(),
                to: machine.state(transition.to()).name().to_string(),
                status: runtime.status,
                guard: transition
                    .guard()
                    .zip(runtime.guard.as_ref())
                    .map(|(def, slot)| slot.report(def)),
            })
            .collect();

        RunReport {
            machine_id: self.machine_id,
            machine_name: machine.name().to_string(),
            status,
            passes,
            started_at,
            completed_at: Some(Utc::now()),
            states,
            transitions,
        }
    }
}

fn poll_slot(machine_id: Uuid, owner: &str, slot: &mut TaskProgress) -> Option<Event> {
    let TaskProgress::Running(handle) = slot else {
        return None;
    };
    let result = handle.poll()?;
    let task = handle.name().to_string();

    if result.is_success() {
        tracing::info!(owner, task = %task, "Task succeeded");
    } else {
        tracing::warn!(
            owner,
            task = %task,
            exit_code = result.exit_code,
            status = %result.status,
            "Task failed"
        );
    }

    *slot = TaskProgress::Finished(result.clone());
    Some(Event::TaskFinished {
        machine_id,
        owner: owner.to_string(),
        task,
        result,
    })
}
