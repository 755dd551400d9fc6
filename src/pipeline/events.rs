use super::phase::{Phase, StopReason};
use super::state::AnalysisState;

/// Messages sent from the loop to any observer (progress display, snapshot writer).
#[derive(Debug, Clone)]
pub enum LoopEvent {
    /// Loop execution started
    RunStarted {
        run_id: String,
        target: String,
        goal: String,
    },
    /// A phase finished; carries the state as it stands afterwards
    PhaseCompleted {
        phase: Phase,
        cycle: u32,
        snapshot: Box<AnalysisState>,
    },
    /// Loop reached Done
    RunFinished {
        reason: StopReason,
        cycles: u32,
    },
}
