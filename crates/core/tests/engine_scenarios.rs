//! Engine behavior over hand-built machines.
//!
//! Scenarios:
//! 1. A machine with nothing to wait for finishes in one pass
//! 2. A wait-for-file guard never fires before its file exists
//! 3. A failed entry task keeps the machine from advancing past its state
//! 4. Exit tasks run after entry tasks and hold back outgoing transitions
//! 5. A failed guard blocks its transition while siblings proceed
//! 6. Process tasks execute exactly once however often they are polled
//! 7. Cyclic machines terminate when cycles are allowed

mod common;

use common::*;
use sf_core::dragen::DragenSimulator;
use sf_core::machine::{CyclePolicy, GraphError, StateMachineBuilder};
use sf_protocol::machine_models::{StateDefinition, TransitionDefinition};
use sf_protocol::report_models::{MachineStatus, StateStatus, TransitionStatus};
use sf_protocol::task_models::{TaskDefinition, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_chain_without_tasks_completes_in_one_pass() {
    // Given: A -> B -> C, no tasks anywhere
    let machine = StateMachineBuilder::new("chain")
        .state(StateDefinition::new("A").start())
        .state(StateDefinition::new("B"))
        .state(StateDefinition::new("C"))
        .transition(TransitionDefinition::new("A-B", "A", "B"))
        .transition(TransitionDefinition::new("B-C", "B", "C"))
        .build()
        .expect("valid machine");

    // When
    let report = simulator_engine()
        .run(&machine, CancellationToken::new())
        .await;

    // Then: every transition fired within the first pass
    assert_eq!(report.status, MachineStatus::Completed);
    assert_eq!(report.passes, 1);
    assert_eq!(report.activated_count(), 3);
    assert_transition(&report, "A-B", TransitionStatus::Fired);
    assert_transition(&report, "B-C", TransitionStatus::Fired);
    assert!(report.completed_at.is_some());
}

#[tokio::test]
async fn test_wait_for_file_guard_never_fires_early() {
    let dir = tempdir().expect("Failed to create temp dir");
    let trigger = dir.path().join("RTAComplete.txt");

    let machine = Arc::new(
        StateMachineBuilder::new("guarded")
            .state(StateDefinition::new("Waiting").start())
            .state(StateDefinition::new("Done"))
            .transition(
                TransitionDefinition::new("go", "Waiting", "Done")
                    .guarded_by(TaskDefinition::wait_for_file("wait", &trigger)),
            )
            .build()
            .expect("valid machine"),
    );

    // Given: no trigger file; the run keeps polling until the deadline
    let report = simulator_engine()
        .run_to_completion(Arc::clone(&machine), Duration::from_millis(200))
        .await;

    assert_eq!(report.status, MachineStatus::TimedOut);
    assert!(report.passes > 1, "guard should be polled on several passes");
    assert_state(&report, "Done", StateStatus::Inactive);
    assert_transition(&report, "go", TransitionStatus::Guarding);

    // When: the file appears while a second run is polling
    let (engine, mut rx) = engine_with_events(Arc::new(DragenSimulator::new()));
    let stop = CancellationToken::new();
    let run_machine = Arc::clone(&machine);
    let handle = tokio::spawn(async move { engine.run(&run_machine, stop).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let before = drain_events(&mut rx);
    assert!(!has_activation(&before, "Done"));

    std::fs::write(&trigger, "").expect("Failed to write trigger");
    let report = handle.await.expect("engine task");

    // Then
    assert_eq!(report.status, MachineStatus::Completed);
    assert_state(&report, "Done", StateStatus::Active);
    assert_transition(&report, "go", TransitionStatus::Fired);
    let after = drain_events(&mut rx);
    assert!(has_activation(&after, "Done"));
}

#[tokio::test]
async fn test_failed_entry_task_stops_advancement() {
    let dir = tempdir().expect("Failed to create temp dir");
    let machine = StateMachineBuilder::new("failing")
        .state(
            StateDefinition::new("Demux")
                .start()
                .on_enter(demultiplex_task("demux", dir.path())),
        )
        .state(StateDefinition::new("Next"))
        .transition(TransitionDefinition::new("demux-next", "Demux", "Next"))
        .build()
        .expect("valid machine");

    let engine = fast_engine(Arc::new(DragenSimulator::new().with_failing_demultiplex()));
    let report = engine.run(&machine, CancellationToken::new()).await;

    assert_eq!(report.status, MachineStatus::Failed);
    assert_state(&report, "Demux", StateStatus::Failed);
    assert_state(&report, "Next", StateStatus::Inactive);
    assert_transition(&report, "demux-next", TransitionStatus::Pending);

    let failed = report.failed_tasks();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].1.result.as_ref().map(|r| r.exit_code), Some(1));
}

#[tokio::test]
async fn test_exit_task_runs_before_transition() {
    let dir = tempdir().expect("Failed to create temp dir");
    let marker = dir.path().join("exit-marker");
    let (engine, mut rx) = engine_with_events(Arc::new(DragenSimulator::new()));

    let machine = StateMachineBuilder::new("exit")
        .state(
            StateDefinition::new("Align")
                .start()
                .on_enter(alignment_task("SM-001", dir.path()))
                .on_exit(TaskDefinition::wait_for_file("marker", &marker)),
        )
        .state(StateDefinition::new("After"))
        .transition(TransitionDefinition::new("align-after", "Align", "After"))
        .build()
        .expect("valid machine");

    let stop = CancellationToken::new();
    let handle = tokio::spawn(async move { engine.run(&machine, stop).await });

    // The entry task has long finished, yet the exit task holds the transition.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!has_activation(&drain_events(&mut rx), "After"));

    std::fs::write(&marker, "").expect("Failed to write marker");
    let report = handle.await.expect("engine task");

    assert_eq!(report.status, MachineStatus::Completed);
    assert_state(&report, "Align", StateStatus::Completed);
    assert_state(&report, "After", StateStatus::Active);

    let align = report.state("Align").expect("Align state");
    assert_eq!(
        align.on_exit.as_ref().map(|t| t.status),
        Some(TaskStatus::Succeeded)
    );
    assert!(dir
        .path()
        .join("alignment/SM-001/SM-001-replay.json")
        .exists());
}

#[tokio::test]
async fn test_failed_guard_blocks_only_its_transition() {
    let dir = tempdir().expect("Failed to create temp dir");

    let machine = StateMachineBuilder::new("guards")
        .state(StateDefinition::new("Start").start())
        .state(StateDefinition::new("Blocked"))
        .state(StateDefinition::new("Open"))
        .transition(
            TransitionDefinition::new("to-blocked", "Start", "Blocked")
                .guarded_by(demultiplex_task("guard-demux", dir.path())),
        )
        .transition(TransitionDefinition::new("to-open", "Start", "Open"))
        .build()
        .expect("valid machine");

    let engine = fast_engine(Arc::new(DragenSimulator::new().with_failing_demultiplex()));
    let report = engine.run(&machine, CancellationToken::new()).await;

    assert_eq!(report.status, MachineStatus::Failed);
    assert_transition(&report, "to-blocked", TransitionStatus::Blocked);
    assert_transition(&report, "to-open", TransitionStatus::Fired);
    assert_state(&report, "Blocked", StateStatus::Inactive);
    assert_state(&report, "Open", StateStatus::Active);
}

#[tokio::test]
async fn test_process_tasks_execute_once() {
    let dir = tempdir().expect("Failed to create temp dir");
    let runner = Arc::new(CountingRunner::new(
        DragenSimulator::new().with_delay(Duration::from_millis(50)),
    ));
    let (engine, mut rx) = engine_with_events(runner.clone());

    let mut builder = StateMachineBuilder::new("fan-out");
    builder.add_state(StateDefinition::new("Root").start());
    for sample in ["SM-001", "SM-002", "SM-003"] {
        builder.add_state(StateDefinition::new(sample).on_enter(alignment_task(sample, dir.path())));
        builder.add_transition(TransitionDefinition::new(
            format!("Root To {sample}"),
            "Root",
            sample,
        ));
    }
    let machine = builder.build().expect("valid machine");

    let report = engine.run(&machine, CancellationToken::new()).await;

    // Several passes polled the running tasks; each started only once.
    assert_eq!(report.status, MachineStatus::Completed);
    assert!(report.passes > 1);
    assert_eq!(runner.total(), 3);
    assert_eq!(runner.max_per_command(), 1);

    let events = drain_events(&mut rx);
    assert_event_sequence(&events);
    for sample in ["SM-001", "SM-002", "SM-003"] {
        assert_eq!(count_task_starts(&events, sample), 1);
    }
}

#[tokio::test]
async fn test_cycle_allowed_terminates() {
    let builder = || {
        StateMachineBuilder::new("loop")
            .state(StateDefinition::new("A").start())
            .state(StateDefinition::new("B"))
            .transition(TransitionDefinition::new("A-B", "A", "B"))
            .transition(TransitionDefinition::new("B-A", "B", "A"))
    };

    assert!(matches!(
        builder().build(),
        Err(GraphError::Cycle { .. })
    ));

    let machine = builder()
        .cycle_policy(CyclePolicy::Allow)
        .build()
        .expect("cycles allowed");

    let report = simulator_engine()
        .run(&machine, CancellationToken::new())
        .await;

    // Each transition fires at most once and the run still quiesces.
    assert_eq!(report.status, MachineStatus::Completed);
    assert_transition(&report, "A-B", TransitionStatus::Fired);
    assert_transition(&report, "B-A", TransitionStatus::Fired);
    assert_eq!(report.activated_count(), 2);
}
