use sf_protocol::*;
use std::path::PathBuf;

#[test]
fn test_machine_definition_deserialization_from_yaml() {
    let yaml_str = r#"
name: novaseq-run
states:
  - id: SequencingRunComplete
    start: true
  - id: Demultiplex
    label: Demultiplex run
    on-enter:
      name: demux
      type: demultiplex
      input-dir: /seq/runs/RUN1
      output-dir: /seq/dragen/RUN1/fastq
      sample-sheet: /seq/dragen/RUN1/SampleSheet_hsa.csv
transitions:
  - id: sequencing-complete-to-demultiplex
    from: SequencingRunComplete
    to: Demultiplex
    guard:
      name: wait-for-rta
      type: wait-for-file
      path: /seq/runs/RUN1/RTAComplete.txt
"#;

    let machine: MachineDefinition =
        serde_yaml::from_str(yaml_str).expect("Failed to deserialize MachineDefinition");

    assert_eq!(machine.name, "novaseq-run");
    assert_eq!(machine.states.len(), 2);
    assert_eq!(machine.transitions.len(), 1);

    assert!(machine.states[0].start);
    assert!(machine.states[0].on_enter.is_none());
    assert_eq!(machine.states[1].label.as_deref(), Some("Demultiplex run"));

    let demux = machine.states[1].on_enter.as_ref().expect("on-enter task");
    assert_eq!(demux.name, "demux");
    match &demux.kind {
        TaskKind::Demultiplex(params) => {
            assert_eq!(params.input_dir, PathBuf::from("/seq/runs/RUN1"));
            assert_eq!(
                params.sample_sheet,
                PathBuf::from("/seq/dragen/RUN1/SampleSheet_hsa.csv")
            );
        }
        other => panic!("Expected demultiplex task, got {other:?}"),
    }

    let guard = machine.transitions[0].guard.as_ref().expect("guard task");
    assert_eq!(
        guard.kind,
        TaskKind::WaitForFile {
            path: PathBuf::from("/seq/runs/RUN1/RTAComplete.txt")
        }
    );
}

#[test]
fn test_alignment_optional_fields_default_to_none() {
    let yaml_str = r#"
name: align
type: alignment
reference: /ref/hg38
fastq-list: /out/Reports/fastq_list.csv
fastq-list-sample-id: FC1.1.SM-1
output-dir: /out/SM-1
intermediate-results-dir: /staging
output-file-prefix: SM-1
vc-sample-name: SM-1
"#;

    let task: TaskDefinition = serde_yaml::from_str(yaml_str).expect("Failed to parse task");
    match task.kind {
        TaskKind::Alignment(params) => {
            assert_eq!(params.fastq_list_sample_id, "FC1.1.SM-1");
            assert!(params.contamination_file.is_none());
            assert!(params.coverage_bed.is_none());
            assert!(params.sample_sex.is_none());
        }
        other => panic!("Expected alignment task, got {other:?}"),
    }
}

#[test]
fn test_unknown_task_type_is_rejected() {
    let yaml_str = r#"
name: mystery
type: teleport
"#;

    let result: Result<TaskDefinition, _> = serde_yaml::from_str(yaml_str);
    assert!(result.is_err());
}

#[test]
fn test_task_definition_json_shape() {
    let task = TaskDefinition::wait_for_file("wait", "/runs/RTAComplete.txt");
    let json = serde_json::to_value(&task).expect("Failed to serialize TaskDefinition");

    assert_eq!(json["name"], "wait");
    assert_eq!(json["type"], "wait-for-file");
    assert_eq!(json["path"], "/runs/RTAComplete.txt");

    let deserialized: TaskDefinition =
        serde_json::from_value(json).expect("Failed to deserialize TaskDefinition");
    assert_eq!(deserialized, task);
}

#[test]
fn test_demultiplex_metrics_task_shape() {
    let yaml_str = r#"
name: demux-metrics
type: demultiplex-metrics
stats-file: /out/fastq/Reports/Demultiplex_Stats.csv
"#;
    let task: TaskDefinition =
        serde_yaml::from_str(yaml_str).expect("Failed to parse metrics task");

    assert_eq!(
        task,
        TaskDefinition::demultiplex_metrics("demux-metrics", "/out/fastq/Reports/Demultiplex_Stats.csv")
    );
    assert!(!task.kind.is_process());
    assert_eq!(task.kind.label(), "demultiplex-metrics");
}

#[test]
fn test_task_result_success_is_exit_code_zero() {
    assert!(TaskResult::success("Success").is_success());
    assert!(!TaskResult::failure(1, "Failed").is_success());
    assert!(!TaskResult::failure(-1, "Killed").is_success());

    // Status text plays no part in success.
    assert!(TaskResult::failure(0, "Failed?").is_success());
}

#[test]
fn test_machine_status_serialization() {
    let json = serde_json::to_value(MachineStatus::TimedOut).expect("serialize");
    assert_eq!(json, "TIMED_OUT");

    let deserialized: MachineStatus = serde_json::from_value(json).expect("deserialize");
    assert_eq!(deserialized, MachineStatus::TimedOut);

    assert!(MachineStatus::Completed.is_quiescent());
    assert!(MachineStatus::Failed.is_quiescent());
    assert!(!MachineStatus::Stopped.is_quiescent());
    assert!(!MachineStatus::TimedOut.is_quiescent());
}

#[test]
fn test_global_config_defaults() {
    let config: GlobalConfig = serde_json::from_str("{}").expect("empty config");

    assert_eq!(config.poll_interval_ms, 1000);
    assert!(!config.allow_cycles);
    assert_eq!(config.run_timeout_secs, 86_400);
    assert_eq!(config.dragen.mode, RunnerMode::Simulator);
    assert_eq!(config.dragen.program, "dragen");
    assert_eq!(config, GlobalConfig::default());
}

#[test]
fn test_event_serialization() {
    use uuid::Uuid;

    let machine_id = Uuid::new_v4();
    let event = Event::TaskFinished {
        machine_id,
        owner: "Demultiplex".to_string(),
        task: "demux".to_string(),
        result: TaskResult::success("Success"),
    };

    let json = serde_json::to_value(&event).expect("Failed to serialize Event");
    assert_eq!(json["type"], "taskFinished");
    assert_eq!(json["payload"]["owner"], "Demultiplex");
    assert_eq!(json["payload"]["result"]["exit-code"], 0);

    let deserialized: Event = serde_json::from_value(json).expect("Failed to deserialize Event");
    assert_eq!(deserialized.machine_id(), machine_id);
}

fn sample_report() -> RunReport {
    RunReport {
        machine_id: uuid::Uuid::new_v4(),
        machine_name: "run".to_string(),
        status: MachineStatus::Failed,
        passes: 3,
        started_at: chrono::Utc::now(),
        completed_at: Some(chrono::Utc::now()),
        states: vec![
            StateReport {
                id: "A".to_string(),
                label: "A".to_string(),
                status: StateStatus::Completed,
                on_enter: Some(TaskReport {
                    name: "ok".to_string(),
                    status: TaskStatus::Succeeded,
                    result: Some(TaskResult::success("Success")),
                }),
                on_exit: None,
            },
            StateReport {
                id: "B".to_string(),
                label: "B".to_string(),
                status: StateStatus::Failed,
                on_enter: Some(TaskReport {
                    name: "broken".to_string(),
                    status: TaskStatus::Failed,
                    result: Some(TaskResult::failure(2, "Failed")),
                }),
                on_exit: None,
            },
            StateReport {
                id: "C".to_string(),
                label: "C".to_string(),
                status: StateStatus::Inactive,
                on_enter: Some(TaskReport {
                    name: "never".to_string(),
                    status: TaskStatus::NotStarted,
                    result: None,
                }),
                on_exit: None,
            },
        ],
        transitions: vec![TransitionReport {
            id: "A-B".to_string(),
            from: "A".to_string(),
            to: "B".to_string(),
            status: TransitionStatus::Fired,
            guard: None,
        }],
    }
}

#[test]
fn test_run_report_failed_tasks() {
    let report = sample_report();

    assert!(!report.is_success());
    assert!(report.is_quiescent());
    assert_eq!(report.activated_count(), 2);
    assert_eq!(report.task_results().len(), 2);

    let failed = report.failed_tasks();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, TaskOwner::OnEnter("B"));
    assert_eq!(failed[0].1.result.as_ref().map(|r| r.exit_code), Some(2));

    assert_eq!(
        report.state("C").map(|s| s.status),
        Some(StateStatus::Inactive)
    );
    assert!(report.transition("A-B").is_some());
}

#[test]
fn test_run_report_round_trip_keeps_statuses() {
    let report = sample_report();
    let json = serde_json::to_string(&report).expect("serialize report");
    let back: RunReport = serde_json::from_str(&json).expect("deserialize report");

    assert_eq!(back.machine_id, report.machine_id);
    assert_eq!(back.states, report.states);
    assert_eq!(back.transitions, report.transitions);
}
