use console::style;

use crate::pipeline::{AnalysisState, RunSummary, StopReason};
use crate::utils::formatting::{format_address, format_duration};

const RULE: &str = "==================================================";
const MAX_NOTES: usize = 5;

/// "SUCCESS" or "STOPPED (<reason>)".
pub fn status_label(reason: StopReason) -> String {
    match reason {
        StopReason::Satisfied => "SUCCESS".to_string(),
        other => format!("STOPPED ({})", other),
    }
}

fn styled_status(reason: StopReason, color: bool) -> String {
    let label = status_label(reason);
    if !color {
        return label;
    }
    match reason {
        StopReason::Satisfied => style(label).green().bold().force_styling(true).to_string(),
        _ => style(label).yellow().bold().force_styling(true).to_string(),
    }
}

fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("Unknown")
}

/// Final human-readable summary printed after the loop exits, whatever the outcome.
pub fn format_final_report(state: &AnalysisState, summary: &RunSummary, color: bool) -> String {
    let target = &state.target;
    let stripped = target.stripped.map(|s| if s { "yes" } else { "no" });
    let mut out = String::new();

    out.push_str(RULE);
    out.push_str("\nANALYSIS SUMMARY\n");
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("Target: {}\n", target.binary_path.display()));
    out.push_str(&format!(
        "Type: {} | Arch: {} | OS: {} | Stripped: {}\n",
        target.binary_type,
        or_unknown(target.arch.as_deref()),
        or_unknown(target.os.as_deref()),
        or_unknown(stripped),
    ));
    if let Some(entry) = target.entrypoint {
        out.push_str(&format!("Entry point: {}\n", format_address(entry)));
    }
    if !target.protections.is_empty() {
        out.push_str(&format!("Protections: {}\n", target.protections.join(", ")));
    }
    out.push_str(&format!("Goal: {}\n", state.goal.primary_objective));
    out.push_str(&format!(
        "Confidence Level: {:.1}%\n",
        state.confidence.understanding_level * 100.0
    ));
    out.push_str(&format!("Status: {}\n", styled_status(summary.stop_reason, color)));
    out.push_str(&format!(
        "Reason: {}\n",
        state.termination.reason.as_deref().unwrap_or("N/A")
    ));
    out.push_str(&format!(
        "Cycles: {} | Steps: {} ({} completed, {} failed) | Duration: {}\n",
        summary.cycles,
        summary.steps_total,
        summary.steps_completed,
        summary.steps_failed,
        format_duration(summary.duration_ms),
    ));
    if summary.degraded_steps > 0 {
        out.push_str(&format!("Degraded steps: {}\n", summary.degraded_steps));
    }

    out.push_str("\nTop Findings:\n");
    if !state.observations.strings.is_empty() {
        out.push_str(&format!(
            "  - Discovered {} relevant strings.\n",
            state.observations.strings.len()
        ));
    }
    if !state.observations.code.is_empty() {
        out.push_str(&format!(
            "  - Summarized {} functions.\n",
            state.observations.code.len()
        ));
    }
    if state.artifacts.notes.is_empty() {
        out.push_str("  - No significant notes recorded.\n");
    } else {
        for note in state.artifacts.notes.iter().take(MAX_NOTES) {
            out.push_str(&format!("  - {}\n", note));
        }
    }
    for key in &state.artifacts.extracted_keys {
        out.push_str(&format!("  - Key: {}\n", key));
    }

    if !state.blockers.is_empty() {
        out.push_str("\nBlockers:\n");
        for blocker in &state.blockers {
            out.push_str(&format!("  - [{}] {}\n", blocker.blocker_type, blocker.description));
        }
    }

    if !state.confidence.unanswered_questions.is_empty() {
        out.push_str("\nRemaining Questions:\n");
        for q in &state.confidence.unanswered_questions {
            out.push_str(&format!("  - {}\n", q));
        }
    }

    out.push_str(RULE);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use crate::pipeline::compute_summary;
    use crate::pipeline::state::{BinaryType, Blocker};

    fn state() -> AnalysisState {
        let mut state = AnalysisState::new(PathBuf::from("/bin/true"), "identify binary format");
        state.target.binary_type = BinaryType::Elf;
        state.target.arch = Some("x86-64".into());
        state
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label(StopReason::Satisfied), "SUCCESS");
        assert_eq!(status_label(StopReason::CycleLimit), "STOPPED (cycle limit reached)");
        assert_eq!(status_label(StopReason::Cancelled), "STOPPED (cancelled)");
    }

    #[test]
    fn test_report_success() {
        let mut state = state();
        state.termination.satisfied = true;
        state.termination.reason = Some("Format identified".into());
        let summary = compute_summary(&state, StopReason::Satisfied, 1500);
        let report = format_final_report(&state, &summary, false);

        assert!(report.contains("Target: /bin/true"));
        assert!(report.contains("Type: ELF | Arch: x86-64 | OS: Unknown | Stripped: Unknown"));
        assert!(report.contains("Status: SUCCESS"));
        assert!(report.contains("Reason: Format identified"));
        assert!(report.contains("No significant notes recorded."));
    }

    #[test]
    fn test_report_stopped_lists_blockers_and_questions() {
        let mut state = state();
        state.blockers.push(Blocker { blocker_type: "anti-debug".into(), description: "ptrace check".into() });
        state.confidence.unanswered_questions.push("What does 0x401136 do?".into());
        let summary = compute_summary(&state, StopReason::PlanExhausted, 10);
        let report = format_final_report(&state, &summary, false);

        assert!(report.contains("Status: STOPPED (plan exhausted)"));
        assert!(report.contains("[anti-debug] ptrace check"));
        assert!(report.contains("What does 0x401136 do?"));
    }

    #[test]
    fn test_report_caps_notes() {
        let mut state = state();
        state.artifacts.notes = (0..8).map(|i| format!("note {}", i)).collect();
        let summary = compute_summary(&state, StopReason::Satisfied, 0);
        let report = format_final_report(&state, &summary, false);
        assert!(report.contains("note 4"));
        assert!(!report.contains("note 5"));
    }

    #[test]
    fn test_color_only_when_requested() {
        let state = state();
        let summary = compute_summary(&state, StopReason::Satisfied, 0);
        assert!(!format_final_report(&state, &summary, false).contains('\u{1b}'));
        assert!(format_final_report(&state, &summary, true).contains('\u{1b}'));
    }
}
