use console::style;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::pipeline::{AnalysisState, LoopEvent, Phase};

/// One short line per loop event, written to stderr.
pub fn describe_event(event: &LoopEvent) -> String {
    match event {
        LoopEvent::RunStarted { target, goal, .. } => {
            format!("[*] Starting analysis for: {}\n[*] Goal: {}", target, goal)
        }
        LoopEvent::PhaseCompleted { phase, cycle, snapshot } => {
            format!("[{}] {}", cycle, describe_phase(*phase, snapshot))
        }
        LoopEvent::RunFinished { reason, cycles } => {
            format!("[*] Loop finished after {} cycle(s): {}", cycles, reason)
        }
    }
}

fn describe_phase(phase: Phase, state: &AnalysisState) -> String {
    match phase {
        Phase::Plan => format!("Plan: {} step(s) queued", state.plan.len()),
        Phase::Execute => match state.last_log_entry() {
            Some(entry) => {
                let outcome = if entry.error.is_some() { "failed" } else { "ok" };
                let degraded = if entry.degraded { " (degraded)" } else { "" };
                format!("Execute: step {} via {}: {}{}", entry.step_id, entry.tool, outcome, degraded)
            }
            None => "Execute: nothing pending".to_string(),
        },
        Phase::Observe => format!(
            "Observe: {} string(s), {} function(s), {} note(s)",
            state.observations.strings.len(),
            state.observations.code.len(),
            state.artifacts.notes.len()
        ),
        Phase::Critique => format!(
            "Critique: confidence {:.1}%, satisfied: {}",
            state.confidence.understanding_level * 100.0,
            if state.termination.satisfied { "yes" } else { "no" }
        ),
        Phase::Done => "Done".to_string(),
    }
}

/// Drain loop events until the sender is dropped.
pub fn spawn_progress_printer(mut rx: mpsc::UnboundedReceiver<LoopEvent>, color: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let line = describe_event(&event);
            if color {
                eprintln!("{}", style(line).cyan());
            } else {
                eprintln!("{}", line);
            }
        }
    })
}
