use serde::{Deserialize, Serialize};
use super::state::{PlanStep, StepStatus};
use tracing::warn;

/// A step proposed by the planner or the critic, before it gets an ID.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStep {
    pub action: String,
    pub tool: String,
}

impl NewStep {
    pub fn new(action: impl Into<String>, tool: impl Into<String>) -> Self {
        Self { action: action.into(), tool: tool.into() }
    }
}

/// Ordered, append-only list of plan steps.
///
/// Steps are never removed. IDs are assigned monotonically and a step only
/// ever moves from `pending` to `completed` or `failed`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    steps: Vec<PlanStep>,
}

impl Plan {
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, step_id: u32) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Earliest step, by insertion order, that is still pending.
    pub fn next_pending(&self) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Pending)
    }

    /// True when there is nothing left to execute.
    pub fn is_exhausted(&self) -> bool {
        self.next_pending().is_none()
    }

    pub fn all_completed(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    fn max_id(&self) -> u32 {
        self.steps.iter().map(|s| s.step_id).max().unwrap_or(0)
    }

    /// Append steps as pending, assigning IDs above the current maximum.
    /// Returns the assigned IDs in order.
    pub fn append_steps(&mut self, new_steps: Vec<NewStep>) -> Vec<u32> {
        let mut next_id = self.max_id();
        let mut ids = Vec::with_capacity(new_steps.len());
        for step in new_steps {
            next_id += 1;
            self.steps.push(PlanStep {
                step_id: next_id,
                action: step.action,
                tool: step.tool,
                status: StepStatus::Pending,
                result_ref: None,
            });
            ids.push(next_id);
        }
        ids
    }

    /// Move a pending step to a terminal status.
    ///
    /// Marking an unknown or already-terminal step is a logic error: it is
    /// logged and ignored, and `false` is returned.
    pub fn mark(&mut self, step_id: u32, status: StepStatus, result_ref: Option<usize>) -> bool {
        if !status.is_terminal() {
            warn!(step_id, "Refusing to mark step back to pending");
            return false;
        }
        let Some(step) = self.steps.iter_mut().find(|s| s.step_id == step_id) else {
            warn!(step_id, "Attempted to mark unknown plan step");
            return false;
        };
        if step.status.is_terminal() {
            warn!(
                step_id,
                current = %step.status,
                requested = %status,
                "Attempted to transition a non-pending plan step"
            );
            return false;
        }
        step.status = status;
        step.result_ref = result_ref;
        true
    }
}
