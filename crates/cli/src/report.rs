//! Terminal rendering of engine events and run reports.

use colored::{ColoredString, Colorize};
use sf_protocol::ipc::Event;
use sf_protocol::report_models::{MachineStatus, RunReport, StateStatus, TransitionStatus};
use sf_protocol::task_models::{TaskResult, TaskStatus};

pub fn print_event(event: &Event) {
    match event {
        Event::MachineStarted { machine_name, .. } => {
            println!("{} {}", "▶".cyan(), machine_name.bold());
        }
        Event::StateActivated { state, .. } => {
            println!("  {} {}", "→".cyan(), state);
        }
        Event::TaskStarted { owner, task, .. } => {
            println!("    {} {} ({})", "started".dimmed(), task, owner.dimmed());
        }
        Event::TaskFinished { task, result, .. } => {
            println!("    {} {}", result_label(result), task);
        }
        Event::TransitionFired { transition, .. } => {
            println!("  {} {}", "fired".green(), transition);
        }
        Event::TransitionBlocked {
            transition, reason, ..
        } => {
            println!("  {} {}: {}", "blocked".red(), transition, reason);
        }
        Event::MachineFinished { status, .. } => {
            println!("{} {}", "■".cyan(), machine_status(*status));
        }
    }
}

pub fn print_report(report: &RunReport) {
    println!();
    println!(
        "{} {} after {} pass(es)",
        report.machine_name.bold(),
        machine_status(report.status),
        report.passes
    );

    println!("{}", "States".underline());
    for state in &report.states {
        let task = state
            .on_enter
            .as_ref()
            .map(|t| format!(" [{}]", task_status(t.status)))
            .unwrap_or_default();
        println!("  {:<11} {}{}", state_status(state.status), state.label, task);
    }

    if !report.transitions.is_empty() {
        println!("{}", "Transitions".underline());
        for transition in &report.transitions {
            println!(
                "  {:<11} {}",
                transition_status(transition.status),
                transition.id
            );
        }
    }

    let failed = report.failed_tasks();
    if !failed.is_empty() {
        println!("{}", "Failed tasks".underline().red());
        for (_, task) in failed {
            let detail = task
                .result
                .as_ref()
                .map(|r| format!("exit {}: {}", r.exit_code, r.status))
                .unwrap_or_default();
            println!("  {} ({})", task.name, detail);
        }
    }
}

fn result_label(result: &TaskResult) -> ColoredString {
    if result.is_success() {
        "ok".green()
    } else {
        format!("failed ({})", result.exit_code).red()
    }
}

fn machine_status(status: MachineStatus) -> ColoredString {
    match status {
        MachineStatus::Running => "RUNNING".yellow(),
        MachineStatus::Completed => "COMPLETED".green().bold(),
        MachineStatus::Failed => "FAILED".red().bold(),
        MachineStatus::Stopped => "STOPPED".yellow().bold(),
        MachineStatus::TimedOut => "TIMED_OUT".red().bold(),
    }
}

fn state_status(status: StateStatus) -> ColoredString {
    match status {
        StateStatus::Inactive => "INACTIVE".dimmed(),
        StateStatus::Active => "ACTIVE".yellow(),
        StateStatus::Completed => "COMPLETED".green(),
        StateStatus::Failed => "FAILED".red(),
    }
}

fn transition_status(status: TransitionStatus) -> ColoredString {
    match status {
        TransitionStatus::Pending => "PENDING".dimmed(),
        TransitionStatus::Guarding => "GUARDING".yellow(),
        TransitionStatus::Fired => "FIRED".green(),
        TransitionStatus::Blocked => "BLOCKED".red(),
    }
}

fn task_status(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::NotStarted => "NOT_STARTED".dimmed(),
        TaskStatus::Running => "RUNNING".yellow(),
        TaskStatus::Succeeded => "SUCCEEDED".green(),
        TaskStatus::Failed => "FAILED".red(),
    }
}
