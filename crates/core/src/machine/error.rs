//! Errors raised while building a state machine.

use thiserror::Error;

/// Graph construction errors.
///
/// All of these are fatal at build time: a machine that fails validation
/// is never handed to the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two states share the same identity.
    #[error("Duplicate state id '{0}'")]
    DuplicateState(String),

    /// Two transitions share the same identity.
    #[error("Duplicate transition id '{0}'")]
    DuplicateTransition(String),

    /// A transition endpoint is not a member of the machine.
    #[error("Transition '{transition}' refers to unknown state '{state}'")]
    UnknownState { transition: String, state: String },

    /// No state is marked as a start state.
    #[error("State machine '{0}' has no start state")]
    NoStartState(String),

    /// The graph contains a cycle and the cycle policy rejects it.
    #[error("Cycle detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
}

/// Type alias for Result with GraphError.
pub type GraphResult<T> = Result<T, GraphError>;
