//! Run report models.
//!
//! A [`RunReport`] is the caller-facing result of running a state machine:
//! the final status of every state, transition and task, enough to tell
//! which branch of a fan-out stalled or failed.

use crate::task_models::{TaskResult, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Overall status of a state machine run.
///
/// A run progresses Running -> Completed or Failed once it is quiescent.
/// Stopped and TimedOut mean the run was interrupted before quiescence.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineStatus {
    /// The engine is still evaluating passes.
    Running,

    /// Quiescent with no failed task.
    Completed,

    /// Quiescent with at least one failed task.
    Failed,

    /// Interrupted by a stop request.
    Stopped,

    /// Still running when the caller's deadline passed.
    TimedOut,
}

impl MachineStatus {
    /// True when the run reached quiescence, whatever its task outcomes.
    pub fn is_quiescent(self) -> bool {
        matches!(self, MachineStatus::Completed | MachineStatus::Failed)
    }
}

/// Engine-level status of a single graph state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateStatus {
    /// Never activated.
    Inactive,

    /// Activated; its tasks are outstanding or it has none.
    Active,

    /// Activated and all of its tasks succeeded.
    Completed,

    /// Activated and one of its tasks failed.
    Failed,
}

impl StateStatus {
    /// True for every status reached by activation.
    pub fn was_activated(self) -> bool {
        !matches!(self, StateStatus::Inactive)
    }
}

/// Engine-level status of a single transition.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionStatus {
    /// Source state not ready yet.
    Pending,

    /// Guard task started and not yet successful.
    Guarding,

    /// Fired; the target state was activated.
    Fired,

    /// Guard task failed; the transition will never fire.
    Blocked,
}

/// Final view of one task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct TaskReport {
    pub name: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
}

/// Final view of one state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct StateReport {
    pub id: String,
    pub label: String,
    pub status: StateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_enter: Option<TaskReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_exit: Option<TaskReport>,
}

/// Final view of one transition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct TransitionReport {
    pub id: String,
    pub from: String,
    pub to: String,
    pub status: TransitionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<TaskReport>,
}

/// Where a failed task was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOwner<'a> {
    OnEnter(&'a str),
    OnExit(&'a str),
    Guard(&'a str),
}

/// Result of running a state machine.
#[derive(Serialize, Deserialize, Debug, Clone, TS)]
#[serde(rename_all = "kebab-case")]
pub struct RunReport {
    /// Unique identifier of this run.
    #[ts(type = "string")]
    pub machine_id: Uuid,

    pub machine_name: String,

    pub status: MachineStatus,

    /// Number of evaluation passes performed.
    pub passes: u64,

    pub started_at: DateTime<Utc>,

    /// Set once the run stops evaluating, for whatever reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    pub states: Vec<StateReport>,

    pub transitions: Vec<TransitionReport>,
}

impl RunReport {
    /// True when the run is quiescent and no task failed.
    pub fn is_success(&self) -> bool {
        self.status == MachineStatus::Completed
    }

    pub fn is_quiescent(&self) -> bool {
        self.status.is_quiescent()
    }

    /// Look up a state by id.
    pub fn state(&self, id: &str) -> Option<&StateReport> {
        self.states.iter().find(|s| s.id == id)
    }

    /// Look up a transition by id.
    pub fn transition(&self, id: &str) -> Option<&TransitionReport> {
        self.transitions.iter().find(|t| t.id == id)
    }

    /// Every finished task, with the state or transition that owns it.
    pub fn task_results(&self) -> Vec<(TaskOwner<'_>, &TaskReport)> {
        let mut tasks = Vec::new();
        for state in &self.states {
            if let Some(task) = &state.on_enter {
                tasks.push((TaskOwner::OnEnter(state.id.as_str()), task));
            }
            if let Some(task) = &state.on_exit {
                tasks.push((TaskOwner::OnExit(state.id.as_str()), task));
            }
        }
        for transition in &self.transitions {
            if let Some(task) = &transition.guard {
                tasks.push((TaskOwner::Guard(transition.id.as_str()), task));
            }
        }
        tasks.retain(|(_, task)| task.result.is_some());
        tasks
    }

    /// Every task that finished with a non-zero exit code.
    pub fn failed_tasks(&self) -> Vec<(TaskOwner<'_>, &TaskReport)> {
        self.task_results()
            .into_iter()
            .filter(|(_, task)| task.status == TaskStatus::Failed)
            .collect()
    }

    /// Number of states that were activated during the run.
    pub fn activated_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| s.status.was_activated())
            .count()
    }
}
