use serde::{Deserialize, Serialize};
use super::plan::Plan;
use super::state::Termination;

/// Position of the loop in the Plan → Execute → Observe → Critique cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Plan,
    Execute,
    Observe,
    Critique,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Execute => "execute",
            Self::Observe => "observe",
            Self::Critique => "critique",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the loop reached `Done`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    Satisfied,
    PlanExhausted,
    CycleLimit,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Satisfied => "satisfied",
            Self::PlanExhausted => "plan exhausted",
            Self::CycleLimit => "cycle limit reached",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure transition function of the loop.
///
/// The only branch is after Critique: finish when satisfied or when nothing is
/// left to execute, otherwise go back to Execute. Replanning from scratch is
/// never automatic.
pub fn next_phase(current: Phase, termination: &Termination, plan: &Plan) -> Phase {
    match current {
        Phase::Plan => Phase::Execute,
        Phase::Execute => Phase::Observe,
        Phase::Observe => Phase::Critique,
        Phase::Critique => {
            if termination.satisfied || plan.is_exhausted() {
                Phase::Done
            } else {
                Phase::Execute
            }
        }
        Phase::Done => Phase::Done,
    }
}

/// Stop reason implied by a Critique → Done transition.
pub fn stop_reason(termination: &Termination) -> StopReason {
    if termination.satisfied {
        StopReason::Satisfied
    } else {
        StopReason::PlanExhausted
    }
}
