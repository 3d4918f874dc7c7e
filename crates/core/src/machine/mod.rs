//! Pipeline graph model.
//!
//! - [`graph`]: the immutable, arena-indexed [`StateMachine`](graph::StateMachine)
//! - [`builder`]: validation and construction
//! - [`error`]: build-time errors

pub mod builder;
pub mod error;
pub mod graph;

pub use builder::{CyclePolicy, StateMachineBuilder};
pub use error::{GraphError, GraphResult};
pub use graph::{State, StateId, StateMachine, Transition, TransitionId};
