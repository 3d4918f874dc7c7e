//! Engine event protocol.
//!
//! The engine reports progress as a stream of [`Event`]s sent over a channel,
//! so callers (the CLI, a dashboard, tests) can follow a run without
//! inspecting engine internals.
//!
//! Uses tagged enum serialization for TypeScript compatibility:
//! ```json
//! {
//!   "type": "stateActivated",
//!   "payload": {
//!     "machine_id": "uuid-here",
//!     "state": "Demultiplex"
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::report_models::MachineStatus;
use crate::task_models::TaskResult;

/// Events sent from the engine to observers.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A run has started evaluating its graph.
    MachineStarted {
        #[ts(type = "string")]
        machine_id: Uuid,
        machine_name: String,
    },

    /// A state became active.
    StateActivated {
        #[ts(type = "string")]
        machine_id: Uuid,
        state: String,
    },

    /// A task was started for a state or transition.
    TaskStarted {
        #[ts(type = "string")]
        machine_id: Uuid,
        /// Id of the owning state or transition.
        owner: String,
        task: String,
    },

    /// A task produced its result.
    TaskFinished {
        #[ts(type = "string")]
        machine_id: Uuid,
        owner: String,
        task: String,
        result: TaskResult,
    },

    /// A transition fired.
    TransitionFired {
        #[ts(type = "string")]
        machine_id: Uuid,
        transition: String,
    },

    /// A transition's guard failed; it will never fire.
    TransitionBlocked {
        #[ts(type = "string")]
        machine_id: Uuid,
        transition: String,
        reason: String,
    },

    /// The run stopped evaluating.
    MachineFinished {
        #[ts(type = "string")]
        machine_id: Uuid,
        status: MachineStatus,
    },
}

impl Event {
    /// Id of the run that produced the event.
    pub fn machine_id(&self) -> Uuid {
        match self {
            Event::MachineStarted { machine_id, .. }
            | Event::StateActivated { machine_id, .. }
            | Event::TaskStarted { machine_id, .. }
            | Event::TaskFinished { machine_id, .. }
            | Event::TransitionFired { machine_id, .. }
            | Event::TransitionBlocked { machine_id, .. }
            | Event::MachineFinished { machine_id, .. } => *machine_id,
        }
    }
}
