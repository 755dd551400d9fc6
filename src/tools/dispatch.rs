use tracing::{debug, info, warn};

use crate::llm::ResilientOracle;
use crate::pipeline::state::{AnalysisState, ExecutionLogEntry, StepStatus};
use crate::prompts::PromptLoader;
use super::registry::ToolRegistry;
use super::{ToolArgs, ToolKind, ToolOutput, ToolRequest, TranslationContext};

const FINDINGS_STRINGS: usize = 20;

/// Runs plan steps against the registered tools and records every attempt.
pub struct ToolDispatcher {
    registry: ToolRegistry,
    oracle: ResilientOracle,
    prompts: PromptLoader,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry, oracle: ResilientOracle, prompts: PromptLoader) -> Self {
        Self { registry, oracle, prompts }
    }

    /// Execute the earliest pending step, if any.
    ///
    /// Exactly one log entry is appended per executed step, whatever the
    /// outcome, and the step is marked with `result_ref` pointing at it.
    /// Returns the executed step id.
    pub async fn execute_next(&self, state: &mut AnalysisState) -> Option<u32> {
        let Some(step) = state.plan.next_pending().cloned() else {
            debug!("No pending step to execute");
            return None;
        };
        let binary_path = state.target.binary_path.clone();
        info!(step_id = step.step_id, tool = %step.tool, action = %step.action, "Executing step");

        let (request, result, degraded) = match self.registry.get(&step.tool) {
            None => (
                ToolRequest { binary_path, args: ToolArgs::PathOnly },
                ToolOutput::failed(None, format!("Unsupported tool: {}", step.tool)),
                false,
            ),
            Some(tool) => {
                let (args, degraded) = match tool.kind() {
                    ToolKind::Direct => (tool.default_args(), false),
                    ToolKind::Translated => {
                        let ctx = TranslationContext {
                            action: &step.action,
                            binary_path: &binary_path,
                            findings: state.findings_summary(FINDINGS_STRINGS),
                            last_output: state.last_log_entry().and_then(|e| e.output.as_deref()),
                            oracle: &self.oracle,
                            prompts: &self.prompts,
                        };
                        match tool.translate(&ctx).await {
                            Ok(args) => (args, false),
                            Err(e) => {
                                warn!(
                                    step_id = step.step_id,
                                    tool = %step.tool,
                                    degraded = true,
                                    error = %e,
                                    "Argument translation failed, using fallback arguments"
                                );
                                (tool.default_args(), true)
                            }
                        }
                    }
                };
                let request = ToolRequest { binary_path, args };
                debug!(step_id = step.step_id, args = ?request.args, "Invoking tool");
                let result = match tool.invoke(&request).await {
                    Ok(out) => out,
                    Err(e) => ToolOutput::failed(None, format!("Tool execution failed: {}", e)),
                };
                (request, result, degraded)
            }
        };

        let status = if result.error.is_some() { StepStatus::Failed } else { StepStatus::Completed };
        match &result.error {
            Some(err) => warn!(step_id = step.step_id, tool = %step.tool, error = %err, "Step failed"),
            None => info!(
                step_id = step.step_id,
                tool = %step.tool,
                output_chars = result.output.as_ref().map_or(0, |o| o.len()),
                "Step completed"
            ),
        }

        state.execution_log.push(ExecutionLogEntry {
            step_id: step.step_id,
            tool: step.tool.clone(),
            input: request,
            output: result.output,
            error: result.error,
            degraded,
        });
        let index = state.execution_log.len() - 1;
        state.plan.mark(step.step_id, status, Some(index));
        Some(step.step_id)
    }
}
