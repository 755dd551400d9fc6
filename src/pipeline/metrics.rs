use serde::Serialize;
use super::phase::StopReason;
use super::state::{AnalysisState, StepStatus};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub stop_reason: StopReason,
    pub cycles: u32,
    pub steps_total: usize,
    pub steps_completed: usize,
    pub steps_failed: usize,
    pub degraded_steps: usize,
    pub understanding_level: f64,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.stop_reason == StopReason::Satisfied
    }
}

pub fn compute_summary(state: &AnalysisState, stop_reason: StopReason, duration_ms: u64) -> RunSummary {
    let count = |status: StepStatus| state.plan.steps().iter().filter(|s| s.status == status).count();
    RunSummary {
        run_id: state.run_id.clone(),
        stop_reason,
        cycles: state.cycle,
        steps_total: state.plan.len(),
        steps_completed: count(StepStatus::Completed),
        steps_failed: count(StepStatus::Failed),
        degraded_steps: state.execution_log.iter().filter(|e| e.degraded).count(),
        understanding_level: state.confidence.understanding_level,
        duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use crate::pipeline::plan::NewStep;

    #[test]
    fn test_summary_counts_step_outcomes() {
        let mut state = AnalysisState::new(PathBuf::from("/bin/true"), "goal");
        state.plan.append_steps(vec![
            NewStep::new("a", "file"),
            NewStep::new("b", "strings"),
            NewStep::new("c", "gdb"),
        ]);
        state.plan.mark(1, StepStatus::Completed, Some(0));
        state.plan.mark(2, StepStatus::Failed, Some(1));
        state.cycle = 2;

        let summary = compute_summary(&state, StopReason::PlanExhausted, 1200);
        assert_eq!(summary.steps_total, 3);
        assert_eq!(summary.steps_completed, 1);
        assert_eq!(summary.steps_failed, 1);
        assert_eq!(summary.cycles, 2);
        assert!(!summary.succeeded());
    }
}
