pub mod events;
pub mod metrics;
pub mod orchestrator;
pub mod phase;
pub mod plan;
pub mod state;

pub use events::LoopEvent;
pub use metrics::{compute_summary, RunSummary};
pub use orchestrator::{AnalysisOrchestrator, DEFAULT_MAX_CYCLES};
pub use phase::{next_phase, stop_reason, Phase, StopReason};
pub use plan::{NewStep, Plan};
pub use state::AnalysisState;
