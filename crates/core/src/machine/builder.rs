//! Validating builder for [`StateMachine`].

use crate::machine::error::{GraphError, GraphResult};
use crate::machine::graph::{State, StateId, StateMachine, Transition, TransitionId};
use sf_protocol::machine_models::{MachineDefinition, StateDefinition, TransitionDefinition};
use std::collections::HashMap;

/// What to do when the graph contains a cycle.
///
/// The engine fires every transition and starts every task at most once, so
/// a cyclic graph still terminates. Whether a cycle is acceptable is left to
/// the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePolicy {
    /// Fail the build with [`GraphError::Cycle`].
    #[default]
    Reject,
    /// Accept cyclic graphs.
    Allow,
}

impl CyclePolicy {
    pub fn from_allow_cycles(allow: bool) -> Self {
        if allow {
            CyclePolicy::Allow
        } else {
            CyclePolicy::Reject
        }
    }
}

/// Collects state and transition definitions and validates them on `build`.
///
/// # Example
///
/// ```
/// use sf_core::machine::builder::StateMachineBuilder;
/// use sf_protocol::machine_models::{StateDefinition, TransitionDefinition};
///
/// let machine = StateMachineBuilder::new("demo")
///     .state(StateDefinition::new("Start").start())
///     .state(StateDefinition::new("Done"))
///     .transition(TransitionDefinition::new("start-to-done", "Start", "Done"))
///     .build()
///     .unwrap();
///
/// assert_eq!(machine.states().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct StateMachineBuilder {
    name: String,
    states: Vec<StateDefinition>,
    transitions: Vec<TransitionDefinition>,
    cycle_policy: CyclePolicy,
}

impl StateMachineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            transitions: Vec::new(),
            cycle_policy: CyclePolicy::default(),
        }
    }

    pub fn state(mut self, state: StateDefinition) -> Self {
        self.states.push(state);
        self
    }

    pub fn transition(mut self, transition: TransitionDefinition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Append a state without consuming the builder.
    pub fn add_state(&mut self, state: StateDefinition) -> &mut Self {
        self.states.push(state);
        self
    }

    /// Append a transition without consuming the builder.
    pub fn add_transition(&mut self, transition: TransitionDefinition) -> &mut Self {
        self.transitions.push(transition);
        self
    }

    pub fn cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }

    /// Validate the definitions and produce the machine.
    ///
    /// # Errors
    ///
    /// - [`GraphError::DuplicateState`] / [`GraphError::DuplicateTransition`]
    /// - [`GraphError::UnknownState`] for a dangling transition endpoint
    /// - [`GraphError::NoStartState`]
    /// - [`GraphError::Cycle`] when the policy is [`CyclePolicy::Reject`]
    pub fn build(self) -> GraphResult<StateMachine> {
        let mut index: HashMap<String, StateId> = HashMap::with_capacity(self.states.len());
        let mut states = Vec::with_capacity(self.states.len());

        for (i, def) in self.states.into_iter().enumerate() {
            let id = StateId(i);
            if index.insert(def.id.clone(), id).is_some() {
                return Err(GraphError::DuplicateState(def.id));
            }
            states.push(State {
                id,
                label: def.label.unwrap_or_else(|| def.id.clone()),
                name: def.id,
                is_start: def.start,
                on_enter: def.on_enter,
                on_exit: def.on_exit,
            });
        }

        if !states.iter().any(|s| s.is_start) {
            return Err(GraphError::NoStartState(self.name));
        }

        let mut seen_transitions: HashMap<String, TransitionId> = HashMap::new();
        let mut transitions = Vec::with_capacity(self.transitions.len());
        let mut outgoing = vec![Vec::new(); states.len()];

        for (i, def) in self.transitions.into_iter().enumerate() {
            let id = TransitionId(i);
            if seen_transitions.insert(def.id.clone(), id).is_some() {
                return Err(GraphError::DuplicateTransition(def.id));
            }
            let lookup = |state: &str| {
                index
                    .get(state)
                    .copied()
                    .ok_or_else(|| GraphError::UnknownState {
                        transition: def.id.clone(),
                        state: state.to_string(),
                    })
            };
            let from = lookup(&def.from)?;
            let to = lookup(&def.to)?;

            outgoing[from.0].push(id);
            transitions.push(Transition {
                id,
                name: def.id,
                from,
                to,
                guard: def.guard,
            });
        }

        let machine = StateMachine {
            name: self.name,
            states,
            transitions,
            outgoing,
        };

        if self.cycle_policy == CyclePolicy::Reject {
            if let Some(path) = find_cycle(&machine) {
                return Err(GraphError::Cycle { path });
            }
        }

        Ok(machine)
    }
}

impl StateMachine {
    /// Build a machine from a loaded definition.
    pub fn from_definition(
        definition: &MachineDefinition,
        cycle_policy: CyclePolicy,
    ) -> GraphResult<StateMachine> {
        let mut builder = StateMachineBuilder::new(definition.name.clone()).cycle_policy(cycle_policy);
        for state in &definition.states {
            builder.add_state(state.clone());
        }
        for transition in &definition.transitions {
            builder.add_transition(transition.clone());
        }
        builder.build()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first search for a cycle; returns the state names along it,
/// starting and ending with the same state.
fn find_cycle(machine: &StateMachine) -> Option<Vec<String>> {
    let mut marks = vec![Mark::Unvisited; machine.states.len()];
    let mut stack: Vec<StateId> = Vec::new();

    for state in &machine.states {
        if marks[state.id.0] == Mark::Unvisited {
            if let Some(cycle) = visit(machine, state.id, &mut marks, &mut stack) {
                return Some(
                    cycle
                        .into_iter()
                        .map(|id| machine.state(id).name.clone())
                        .collect(),
                );
            }
        }
    }
    None
}

fn visit(
    machine: &StateMachine,
    id: StateId,
    marks: &mut [Mark],
    stack: &mut Vec<StateId>,
) -> Option<Vec<StateId>> {
    marks[id.0] = Mark::InProgress;
    stack.push(id);

    for transition in machine.outgoing(id) {
        let next = transition.to;
        match marks[next.0] {
            Mark::InProgress => {
                let start = stack.iter().position(|s| *s == next).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            Mark::Unvisited => {
                if let Some(cycle) = visit(machine, next, marks, stack) {
                    return Some(cycle);
                }
            }
            Mark::Done => {}
        }
    }

    stack.pop();
    marks[id.0] = Mark::Done;
    None
}
