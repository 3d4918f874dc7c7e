//! The immutable pipeline graph.
//!
//! States and transitions live in arenas owned by the [`StateMachine`] and are
//! addressed by [`StateId`] / [`TransitionId`], assigned in insertion order
//! when the machine is built. Nothing here changes once the machine exists;
//! activity and task progress belong to the engine.

use sf_protocol::task_models::TaskDefinition;
use std::fmt;

/// Arena index of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub(crate) usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Arena index of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(pub(crate) usize);

impl TransitionId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node of the pipeline graph.
#[derive(Debug, Clone)]
pub struct State {
    pub(crate) id: StateId,
    pub(crate) name: String,
    pub(crate) label: String,
    pub(crate) is_start: bool,
    pub(crate) on_enter: Option<TaskDefinition>,
    pub(crate) on_exit: Option<TaskDefinition>,
}

impl State {
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Caller-supplied identity, unique within the machine.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_start(&self) -> bool {
        self.is_start
    }

    pub fn on_enter(&self) -> Option<&TaskDefinition> {
        self.on_enter.as_ref()
    }

    pub fn on_exit(&self) -> Option<&TaskDefinition> {
        self.on_exit.as_ref()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A directed edge between two states.
#[derive(Debug, Clone)]
pub struct Transition {
    pub(crate) id: TransitionId,
    pub(crate) name: String,
    pub(crate) from: StateId,
    pub(crate) to: StateId,
    pub(crate) guard: Option<TaskDefinition>,
}

impl Transition {
    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn from(&self) -> StateId {
        self.from
    }

    pub fn to(&self) -> StateId {
        self.to
    }

    pub fn guard(&self) -> Option<&TaskDefinition> {
        self.guard.as_ref()
    }
}

/// The complete, validated pipeline graph.
///
/// Built through [`StateMachineBuilder`](crate::machine::builder::StateMachineBuilder),
/// which guarantees every transition endpoint exists and at least one start
/// state is present.
#[derive(Debug, Clone)]
pub struct StateMachine {
    pub(crate) name: String,
    pub(crate) states: Vec<State>,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) outgoing: Vec<Vec<TransitionId>>,
}

impl StateMachine {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn start_states(&self) -> impl Iterator<Item = &State> {
        self.states.iter().filter(|s| s.is_start)
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.0]
    }

    pub fn transition(&self, id: TransitionId) -> &Transition {
        &self.transitions[id.0]
    }

    pub fn state_by_name(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    /// Transitions leaving `id`, in insertion order.
    pub fn outgoing(&self, id: StateId) -> impl Iterator<Item = &Transition> {
        self.outgoing[id.0].iter().map(|t| &self.transitions[t.0])
    }

    /// Total number of tasks attached to states and transitions.
    pub fn task_count(&self) -> usize {
        let state_tasks: usize = self
            .states
            .iter()
            .map(|s| usize::from(s.on_enter.is_some()) + usize::from(s.on_exit.is_some()))
            .sum();
        let guards = self.transitions.iter().filter(|t| t.guard.is_some()).count();
        state_tasks + guards
    }
}
