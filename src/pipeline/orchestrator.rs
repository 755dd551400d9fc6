use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agents::{run_critic, run_observer, run_planner};
use crate::errors::ReverieError;
use crate::llm::ResilientOracle;
use crate::prompts::PromptLoader;
use crate::tools::{ToolDispatcher, ToolRegistry};
use super::events::LoopEvent;
use super::metrics::{compute_summary, RunSummary};
use super::phase::{next_phase, stop_reason, Phase, StopReason};
use super::state::AnalysisState;

pub const DEFAULT_MAX_CYCLES: u32 = 25;

/// Drives Plan → Execute → Observe → Critique until the critic is satisfied,
/// the plan runs dry, the cycle budget is spent or the run is cancelled.
pub struct AnalysisOrchestrator {
    oracle: ResilientOracle,
    prompts: PromptLoader,
    dispatcher: ToolDispatcher,
    max_cycles: u32,
    cancel_token: CancellationToken,
    event_tx: Option<mpsc::UnboundedSender<LoopEvent>>,
}

impl AnalysisOrchestrator {
    pub fn new(oracle: ResilientOracle, prompts: PromptLoader, registry: ToolRegistry) -> Self {
        let dispatcher = ToolDispatcher::new(registry, oracle.clone(), prompts.clone());
        Self {
            oracle,
            prompts,
            dispatcher,
            max_cycles: DEFAULT_MAX_CYCLES,
            cancel_token: CancellationToken::new(),
            event_tx: None,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = max_cycles.max(1);
        self
    }

    /// Replace the cancel token with an external one (e.g. wired to Ctrl-C).
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Attach an event channel for streaming loop events to an observer.
    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<LoopEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Events are only built when a listener is attached; phase snapshots clone the state.
    fn emit(&self, make: impl FnOnce() -> LoopEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(make());
        }
    }

    /// Run the loop to completion.
    ///
    /// Only a planning failure is fatal; every other failure is absorbed by
    /// the phase that hit it.
    pub async fn run(&self, state: &mut AnalysisState) -> Result<RunSummary, ReverieError> {
        let started = Instant::now();
        info!(
            run_id = %state.run_id,
            target = %state.target.binary_path.display(),
            goal = %state.goal.primary_objective,
            provider = self.oracle.provider_name(),
            model = self.oracle.model_name(),
            max_cycles = self.max_cycles,
            "Analysis started"
        );
        self.emit(|| LoopEvent::RunStarted {
            run_id: state.run_id.clone(),
            target: state.target.binary_path.display().to_string(),
            goal: state.goal.primary_objective.clone(),
        });

        let mut phase = Phase::Plan;
        let reason = loop {
            if self.cancel_token.is_cancelled() {
                warn!(phase = %phase, "Cancellation requested, stopping");
                break StopReason::Cancelled;
            }

            let next = self.step(phase, state).await?;
            if next == Phase::Done {
                break stop_reason(&state.termination);
            }
            if phase == Phase::Critique && state.cycle >= self.max_cycles {
                warn!(cycles = state.cycle, "Cycle budget exhausted, stopping");
                break StopReason::CycleLimit;
            }
            phase = next;
        };

        let summary = compute_summary(state, reason, started.elapsed().as_millis() as u64);
        info!(
            reason = %reason,
            cycles = summary.cycles,
            steps = summary.steps_total,
            completed = summary.steps_completed,
            failed = summary.steps_failed,
            duration_ms = summary.duration_ms,
            "Analysis finished"
        );
        self.emit(|| LoopEvent::RunFinished { reason, cycles: state.cycle });
        Ok(summary)
    }

    /// Run a single phase against `state` and return the phase that follows.
    pub async fn step(&self, phase: Phase, state: &mut AnalysisState) -> Result<Phase, ReverieError> {
        debug!(phase = %phase, cycle = state.cycle, "Phase started");
        match phase {
            Phase::Plan => run_planner(state, &self.oracle, &self.prompts).await?,
            Phase::Execute => {
                if self.dispatcher.execute_next(state).await.is_none() {
                    debug!("Execute phase found no pending step");
                }
            }
            Phase::Observe => run_observer(state, &self.oracle, &self.prompts).await,
            Phase::Critique => {
                run_critic(state, &self.oracle, &self.prompts).await;
                state.cycle += 1;
            }
            Phase::Done => return Ok(Phase::Done),
        }

        self.emit(|| LoopEvent::PhaseCompleted {
            phase,
            cycle: state.cycle,
            snapshot: Box::new(state.clone()),
        });
        Ok(next_phase(phase, &state.termination, &state.plan))
    }
}
