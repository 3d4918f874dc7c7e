//! Assertion helpers over run reports and event streams.

use sf_protocol::ipc::Event;
use sf_protocol::report_models::{RunReport, StateStatus, TransitionStatus};
use tokio::sync::mpsc;

/// Drain every event currently buffered in `rx`.
pub fn drain_events(rx: &mut mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Assert the status of state `id` in `report`.
pub fn assert_state(report: &RunReport, id: &str, status: StateStatus) {
    let state = report
        .state(id)
        .unwrap_or_else(|| panic!("State '{id}' missing from report"));
    assert_eq!(state.status, status, "Unexpected status for state '{id}'");
}

/// Assert the status of transition `id` in `report`.
pub fn assert_transition(report: &RunReport, id: &str, status: TransitionStatus) {
    let transition = report
        .transition(id)
        .unwrap_or_else(|| panic!("Transition '{id}' missing from report"));
    assert_eq!(
        transition.status, status,
        "Unexpected status for transition '{id}'"
    );
}

/// Whether `events` contain an activation of `state`.
pub fn has_activation(events: &[Event], state: &str) -> bool {
    events
        .iter()
        .any(|e| matches!(e, Event::StateActivated { state: s, .. } if s == state))
}

/// Position of the first activation of `state`.
pub fn activation_index(events: &[Event], state: &str) -> Option<usize> {
    events
        .iter()
        .position(|e| matches!(e, Event::StateActivated { state: s, .. } if s == state))
}

/// Position of the first `TaskFinished` event for `task`.
pub fn task_finished_index(events: &[Event], task: &str) -> Option<usize> {
    events
        .iter()
        .position(|e| matches!(e, Event::TaskFinished { task: t, .. } if t == task))
}

/// Number of `TaskStarted` events owned by `owner`.
pub fn count_task_starts(events: &[Event], owner: &str) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::TaskStarted { owner: o, .. } if o == owner))
        .count()
}

/// Assert that events open with `MachineStarted` and close with
/// `MachineFinished`, all for the same run.
pub fn assert_event_sequence(events: &[Event]) {
    assert!(!events.is_empty(), "Event sequence is empty");

    assert!(
        matches!(events[0], Event::MachineStarted { .. }),
        "First event should be MachineStarted, got: {:?}",
        events[0]
    );

    let last = &events[events.len() - 1];
    assert!(
        matches!(last, Event::MachineFinished { .. }),
        "Last event should be MachineFinished, got: {last:?}"
    );

    let id = events[0].machine_id();
    assert!(
        events.iter().all(|e| e.machine_id() == id),
        "Events from more than one run"
    );
}
