//! State machine definition models for `.seqflow/machines/*.yaml`.
//!
//! These are the serializable shape of a pipeline graph. The core crate
//! validates a definition and turns it into an executable state machine.

use crate::task_models::TaskDefinition;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A node of the pipeline graph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct StateDefinition {
    /// Identity, unique within the machine. Transitions refer to it.
    pub id: String,

    /// Human-readable label. Defaults to the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Whether the state is active when the machine starts.
    #[serde(default)]
    pub start: bool,

    /// Task started the first time the state becomes active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_enter: Option<TaskDefinition>,

    /// Task started once the on-enter task has succeeded.
    ///
    /// Outgoing transitions wait for it as well.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_exit: Option<TaskDefinition>,
}

/// A directed edge of the pipeline graph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct TransitionDefinition {
    /// Identity, unique within the machine.
    pub id: String,

    /// Source state id.
    pub from: String,

    /// Target state id.
    pub to: String,

    /// Task whose success is required before the transition fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<TaskDefinition>,
}

/// A complete pipeline graph.
///
/// # Example
///
/// ```yaml
/// name: novaseq-run
/// states:
///   - id: SequencingRunComplete
///     start: true
///   - id: Demultiplex
///     on-enter:
///       name: demux
///       type: demultiplex
///       input-dir: /seq/runs/RUN1
///       output-dir: /seq/dragen/RUN1/fastq
///       sample-sheet: /seq/dragen/RUN1/SampleSheet_hsa.csv
/// transitions:
///   - id: sequencing-complete-to-demultiplex
///     from: SequencingRunComplete
///     to: Demultiplex
///     guard:
///       name: wait-for-rta
///       type: wait-for-file
///       path: /seq/runs/RUN1/RTAComplete.txt
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct MachineDefinition {
    /// Unique name identifying this machine definition.
    pub name: String,

    pub states: Vec<StateDefinition>,

    #[serde(default)]
    pub transitions: Vec<TransitionDefinition>,
}

impl StateDefinition {
    /// A non-start state without tasks.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            start: false,
            on_enter: None,
            on_exit: None,
        }
    }

    /// Mark the state as a start state.
    pub fn start(mut self) -> Self {
        self.start = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn on_enter(mut self, task: TaskDefinition) -> Self {
        self.on_enter = Some(task);
        self
    }

    pub fn on_exit(mut self, task: TaskDefinition) -> Self {
        self.on_exit = Some(task);
        self
    }
}

impl TransitionDefinition {
    /// An unguarded transition.
    pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            guard: None,
        }
    }

    pub fn guarded_by(mut self, task: TaskDefinition) -> Self {
        self.guard = Some(task);
        self
    }
}
