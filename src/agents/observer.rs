use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::ReverieError;
use crate::llm::ResilientOracle;
use crate::pipeline::state::{AnalysisState, Artifacts, Blocker, Observations, TargetUpdate};
use crate::prompts::{PromptLoader, PromptVariables};
use crate::utils::text::clean_terminal_output;
use crate::utils::truncation::{truncate_middle, truncate_output};

const CURRENT_FINDINGS_CHARS: usize = 6_000;

#[derive(Debug, Default, Deserialize)]
struct ObservationResponse {
    #[serde(default)]
    new_observations: Observations,
    #[serde(default)]
    new_artifacts: Artifacts,
    #[serde(default)]
    updated_target_info: Option<TargetUpdate>,
    #[serde(default)]
    blockers: Vec<Blocker>,
}

fn observation_schema() -> serde_json::Value {
    let address = json!({ "type": ["number", "string", "null"] });
    let string_list = json!({ "type": "array", "items": { "type": "string" } });
    json!({
        "type": "object",
        "properties": {
            "new_observations": {
                "type": "object",
                "properties": {
                    "strings": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["value"],
                            "properties": { "value": { "type": "string" }, "offset": address }
                        }
                    },
                    "code": { "type": "array", "items": { "type": "object" } },
                    "runtime": { "type": "array", "items": { "type": "object" } }
                }
            },
            "new_artifacts": {
                "type": "object",
                "properties": {
                    "decoded_strings": string_list,
                    "extracted_keys": string_list,
                    "decrypted_payloads": string_list,
                    "notes": string_list
                }
            },
            "updated_target_info": { "type": ["object", "null"] },
            "blockers": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["type", "description"],
                    "properties": {
                        "type": { "type": "string" },
                        "description": { "type": "string" }
                    }
                }
            }
        }
    })
}

/// Distill the newest, not yet observed, successful log entry into findings.
pub async fn run_observer(state: &mut AnalysisState, oracle: &ResilientOracle, prompts: &PromptLoader) {
    let Some(index) = state.execution_log.len().checked_sub(1) else {
        debug!("Nothing executed yet, skipping observation");
        return;
    };
    if state.observed_through.is_some_and(|seen| seen >= index) {
        debug!(index, "Latest log entry already observed");
        return;
    }
    state.observed_through = Some(index);

    let entry = &state.execution_log[index];
    if let Some(err) = &entry.error {
        debug!(step_id = entry.step_id, error = %err, "Latest step failed, nothing to observe");
        return;
    }
    let tool = entry.tool.clone();

    match request_observation(state, index, oracle, prompts).await {
        Ok(response) => apply(state, response, &tool),
        Err(e) => {
            warn!(tool = %tool, error = %e, "Observation oracle call failed, recording fallback note");
            state.artifacts.notes.push(format!("Processed output from {} (fallback)", tool));
        }
    }
}

async fn request_observation(
    state: &AnalysisState,
    index: usize,
    oracle: &ResilientOracle,
    prompts: &PromptLoader,
) -> Result<ObservationResponse, ReverieError> {
    let entry = &state.execution_log[index];
    let output = entry.output.as_deref().map(clean_terminal_output).unwrap_or_else(|| "No output".into());
    let current = serde_json::to_string(&state.observations)?;

    let prompt = prompts.render("observation", &PromptVariables {
        binary_path: state.target.binary_path.display().to_string(),
        goal: state.goal.primary_objective.clone(),
        tool_name: Some(entry.tool.clone()),
        tool_input: Some(serde_json::to_string(&entry.input)?),
        tool_output: Some(truncate_output(&output)),
        findings: Some(truncate_middle(&current, CURRENT_FINDINGS_CHARS)),
        ..Default::default()
    })?;

    oracle.invoke("observe", &prompt, &observation_schema()).await
}

fn apply(state: &mut AnalysisState, response: ObservationResponse, tool: &str) {
    info!(
        tool,
        strings = response.new_observations.strings.len(),
        code = response.new_observations.code.len(),
        runtime = response.new_observations.runtime.len(),
        notes = response.new_artifacts.notes.len(),
        blockers = response.blockers.len(),
        "Observations recorded"
    );
    state.observations.extend(response.new_observations);
    state.artifacts.extend(response.new_artifacts);
    if let Some(update) = &response.updated_target_info {
        state.target.enrich(update);
        debug!(binary_type = %state.target.binary_type, arch = ?state.target.arch, "Target info updated");
    }
    for blocker in response.blockers {
        warn!(kind = %blocker.blocker_type, description = %blocker.description, "Blocker reported");
        state.blockers.push(blocker);
    }
}
