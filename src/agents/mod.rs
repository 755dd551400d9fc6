pub mod critic;
pub mod observer;
pub mod planner;

pub use critic::run_critic;
pub use observer::run_observer;
pub use planner::run_planner;

use crate::pipeline::state::{AnalysisState, TargetInfo};
use crate::utils::truncation::truncate_error;

const RECENT_ERRORS: usize = 3;

/// Target description shared by the planner and critic prompts.
pub(crate) fn describe_target(target: &TargetInfo) -> String {
    let mut lines = vec![
        format!("Path: {}", target.binary_path.display()),
        format!("Type: {}", target.binary_type),
    ];
    if let Some(arch) = &target.arch {
        lines.push(format!("Arch: {}", arch));
    }
    if let Some(os) = &target.os {
        lines.push(format!("OS: {}", os));
    }
    if let Some(stripped) = target.stripped {
        lines.push(format!("Stripped: {}", stripped));
    }
    if !target.protections.is_empty() {
        lines.push(format!("Protections: {}", target.protections.join(", ")));
    }
    if let Some(entry) = target.entrypoint {
        lines.push(format!("Entry point: {}", crate::utils::formatting::format_address(entry)));
    }
    lines.join("\n")
}

/// The latest failed log entries, newest last.
pub(crate) fn recent_errors(state: &AnalysisState) -> String {
    let errors: Vec<String> = state.execution_log.iter()
        .filter_map(|e| e.error.as_ref().map(|err| format!("Step {} ({}): {}", e.step_id, e.tool, truncate_error(err))))
        .collect();
    let skip = errors.len().saturating_sub(RECENT_ERRORS);
    errors[skip..].join("\n")
}
