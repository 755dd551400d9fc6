use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::ReverieError;
use crate::llm::ResilientOracle;
use crate::pipeline::plan::NewStep;
use crate::pipeline::state::{AnalysisState, Hypothesis, HypothesisStatus};
use crate::prompts::{PromptLoader, PromptVariables};
use crate::tools::canonical_tool_name;
use super::describe_target;

const CONSTRAINTS: &str = "Skip basic information gathering (file/strings) if the information \
    is already clearly present in the findings. Focus on testing leads and deep analysis.";

#[derive(Debug, Deserialize)]
struct PlannerResponse {
    plan: Vec<PlannedStep>,
}

#[derive(Debug, Deserialize)]
struct PlannedStep {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tool: Option<String>,
}

impl PlannedStep {
    fn into_new_step(self) -> NewStep {
        let action = self.description
            .filter(|d| !d.trim().is_empty())
            .or(self.title)
            .unwrap_or_else(|| "Unknown action".to_string());
        let tool = canonical_tool_name(self.tool.as_deref().unwrap_or("unknown"));
        NewStep::new(action, tool)
    }
}

fn planner_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["plan"],
        "properties": {
            "plan": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "step": {},
                        "title": { "type": "string" },
                        "description": { "type": "string" },
                        "tool": { "type": "string" }
                    }
                }
            }
        }
    })
}

/// Fill an empty or exhausted plan from the oracle, or with a single manual
/// inspection step when the oracle is unavailable.
///
/// Fails only when the plan is still empty afterwards.
pub async fn run_planner(
    state: &mut AnalysisState,
    oracle: &ResilientOracle,
    prompts: &PromptLoader,
) -> Result<(), ReverieError> {
    if !state.plan.is_exhausted() {
        debug!(steps = state.plan.len(), "Plan still has pending steps, not replanning");
        return Ok(());
    }

    let proposed = match request_plan(state, oracle, prompts).await {
        Ok(steps) if !steps.is_empty() => Some(steps),
        Ok(_) => {
            warn!("Planner returned an empty plan, using fallback");
            None
        }
        Err(e) => {
            warn!(error = %e, "Planner oracle call failed, using fallback");
            None
        }
    };

    match proposed {
        Some(steps) => {
            for step in &steps {
                debug!(tool = %step.tool, action = %step.action, "Planned step");
            }
            let ids = state.plan.append_steps(steps);
            info!(steps = ids.len(), "Plan generated");
            if state.hypotheses.is_empty() {
                state.hypotheses.push(Hypothesis {
                    id: "h1".to_string(),
                    claim: format!(
                        "The goal '{}' can be achieved by following the generated plan.",
                        state.goal.primary_objective
                    ),
                    confidence: 0.5,
                    evidence: Vec::new(),
                    status: HypothesisStatus::Active,
                });
            }
        }
        None => {
            state.plan.append_steps(vec![NewStep::new("Manual inspection", "file")]);
        }
    }

    if state.plan.is_empty() {
        return Err(ReverieError::Planning("no steps could be planned".into()));
    }
    Ok(())
}

async fn request_plan(
    state: &AnalysisState,
    oracle: &ResilientOracle,
    prompts: &PromptLoader,
) -> Result<Vec<NewStep>, ReverieError> {
    let findings = state.findings_summary(15);
    let prompt = prompts.render("planner", &PromptVariables {
        binary_path: state.target.binary_path.display().to_string(),
        goal: format!("Objective: {}", state.goal.primary_objective),
        target_info: Some(describe_target(&state.target)),
        constraints: Some(CONSTRAINTS.to_string()),
        findings: Some(findings),
        ..Default::default()
    })?;

    let response: PlannerResponse = oracle.invoke("plan", &prompt, &planner_schema()).await?;
    Ok(response.plan.into_iter().map(PlannedStep::into_new_step).collect())
}
