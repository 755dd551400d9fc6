use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::errors::ReverieError;
use crate::llm::ResilientOracle;
use crate::pipeline::plan::NewStep;
use crate::pipeline::state::{AnalysisState, Confidence, Termination};
use crate::prompts::{PromptLoader, PromptVariables};
use crate::tools::canonical_tool_name;
use super::{describe_target, recent_errors};

#[derive(Debug, Deserialize)]
struct CriticResponse {
    #[serde(default)]
    evaluation: Option<String>,
    #[serde(default)]
    confidence_update: Option<ConfidenceUpdate>,
    termination: TerminationUpdate,
    #[serde(default)]
    new_steps: Vec<ProposedStep>,
}

#[derive(Debug, Deserialize)]
struct ConfidenceUpdate {
    #[serde(default)]
    understanding_level: Option<f64>,
    #[serde(default)]
    unanswered_questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TerminationUpdate {
    satisfied: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProposedStep {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    tool: Option<String>,
}

fn critic_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["termination"],
        "properties": {
            "evaluation": { "type": "string" },
            "confidence_update": {
                "type": "object",
                "properties": {
                    "understanding_level": { "type": "number" },
                    "unanswered_questions": { "type": "array", "items": { "type": "string" } }
                }
            },
            "termination": {
                "type": "object",
                "required": ["satisfied"],
                "properties": {
                    "satisfied": { "type": "boolean" },
                    "reason": { "type": ["string", "null"] }
                }
            },
            "new_steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "action": { "type": "string" },
                        "tool": { "type": "string" }
                    }
                }
            }
        }
    })
}

/// Judge progress: update confidence, decide termination and extend the plan.
///
/// Without an oracle answer the run counts as satisfied only when every
/// planned step completed; confidence is then left as it was.
pub async fn run_critic(state: &mut AnalysisState, oracle: &ResilientOracle, prompts: &PromptLoader) {
    match request_critique(state, oracle, prompts).await {
        Ok(response) => apply(state, response),
        Err(e) => {
            warn!(error = %e, "Critic oracle call failed, using completion-based fallback");
            let satisfied = state.plan.all_completed();
            let reason = if satisfied {
                "All planned steps completed (fallback)."
            } else {
                "Plan still in progress (fallback)."
            };
            state.termination = Termination { satisfied, reason: Some(reason.to_string()) };
        }
    }
    info!(
        satisfied = state.termination.satisfied,
        reason = state.termination.reason.as_deref().unwrap_or(""),
        understanding = state.confidence.understanding_level,
        "Critique complete"
    );
}

async fn request_critique(
    state: &AnalysisState,
    oracle: &ResilientOracle,
    prompts: &PromptLoader,
) -> Result<CriticResponse, ReverieError> {
    let plan_status = state.plan.steps().iter()
        .map(|s| format!("Step {}: {} [{}] ({})", s.step_id, s.action, s.tool, s.status))
        .collect::<Vec<_>>()
        .join("\n");
    let findings = match state.findings_summary(20) {
        s if s.is_empty() => "No meaningful observations yet.".to_string(),
        s => s,
    };
    let confidence = format!(
        "Level: {}, Gaps: {}",
        state.confidence.understanding_level,
        state.confidence.unanswered_questions.join(", ")
    );

    let prompt = prompts.render("critic", &PromptVariables {
        binary_path: state.target.binary_path.display().to_string(),
        goal: format!("Objective: {}", state.goal.primary_objective),
        target_info: Some(describe_target(&state.target)),
        plan_status: Some(plan_status),
        findings: Some(findings),
        confidence: Some(confidence),
        recent_errors: Some(recent_errors(state)),
        ..Default::default()
    })?;

    oracle.invoke("critique", &prompt, &critic_schema()).await
}

fn apply(state: &mut AnalysisState, response: CriticResponse) {
    if let Some(evaluation) = &response.evaluation {
        info!(evaluation = %evaluation, "Critic evaluation");
    }

    let previous = state.confidence.understanding_level;
    let update = response.confidence_update;
    let level = update.as_ref()
        .and_then(|u| u.understanding_level)
        .filter(|l| l.is_finite())
        .unwrap_or(previous)
        .clamp(0.0, 1.0);
    state.confidence = Confidence {
        understanding_level: level,
        unanswered_questions: update.map(|u| u.unanswered_questions).unwrap_or_default(),
    };

    let satisfied = response.termination.satisfied;
    state.termination = Termination {
        satisfied,
        reason: Some(response.termination.reason.unwrap_or_else(|| "No reason provided".to_string())),
    };

    if !satisfied && !response.new_steps.is_empty() {
        let steps: Vec<NewStep> = response.new_steps.into_iter()
            .map(|s| NewStep::new(
                s.action.unwrap_or_else(|| "Unknown action".to_string()),
                canonical_tool_name(s.tool.as_deref().unwrap_or("unknown")),
            ))
            .collect();
        let ids = state.plan.append_steps(steps);
        info!(added = ids.len(), "Critic extended the plan");
    }
}
