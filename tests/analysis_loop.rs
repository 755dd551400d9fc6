#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;

use reverie::errors::{ReverieError, RetryConfig};
use reverie::llm::{ResilientOracle, ScriptedProvider};
use reverie::pipeline::state::{BinaryType, StepStatus};
use reverie::pipeline::{AnalysisOrchestrator, AnalysisState, StopReason};
use reverie::prompts::PromptLoader;
use reverie::reporting::format_final_report;
use reverie::tools::registry::ToolSettings;
use reverie::tools::ToolRegistry;
use tokio_util::sync::CancellationToken;

fn orchestrator(provider: Arc<ScriptedProvider>) -> AnalysisOrchestrator {
    let oracle = ResilientOracle::new(provider, RetryConfig::immediate(0));
    AnalysisOrchestrator::new(
        oracle,
        PromptLoader::default(),
        ToolRegistry::standard(&ToolSettings::default()),
    )
}

fn reply(json: &str) -> Result<String, ReverieError> {
    Ok(json.to_string())
}

#[tokio::test]
async fn test_identify_format_of_system_binary() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        reply(r#"{"plan": [{"step": 1, "title": "Probe", "description": "Identify the file format", "tool": "file"}]}"#),
        reply(r#"{"updated_target_info": {"binary_type": "ELF", "arch": "x86-64"}, "new_artifacts": {"notes": ["Dynamically linked ELF"]}}"#),
        // Critic reply is schema-invalid, forcing the completed-plan fallback.
        reply(r#"{"evaluation": "looks done"}"#),
    ]));
    let orch = orchestrator(provider.clone());
    let mut state = AnalysisState::new(PathBuf::from("/bin/true"), "identify binary format");

    let summary = orch.run(&mut state).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::Satisfied);
    assert_eq!(provider.calls(), 3);
    assert_eq!(state.plan.len(), 1);
    assert_eq!(state.plan.steps()[0].status, StepStatus::Completed);
    assert_eq!(state.plan.steps()[0].result_ref, Some(0));

    let entry = &state.execution_log[0];
    assert_eq!(entry.tool, "file");
    assert!(entry.error.is_none());
    assert!(entry.output.as_deref().unwrap_or("").contains("ELF"));

    assert_eq!(state.target.binary_type, BinaryType::Elf);
    assert_eq!(state.target.arch.as_deref(), Some("x86-64"));
    assert!(state.termination.satisfied);
    assert_eq!(state.hypotheses.len(), 1);

    let report = format_final_report(&state, &summary, false);
    assert!(report.contains("Type: ELF"));
    assert!(report.contains("Status: SUCCESS"));
    assert!(report.contains("Dynamically linked ELF"));
}

#[tokio::test]
async fn test_failed_step_is_recorded_and_loop_continues() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        reply(r#"{"plan": [{"description": "Search the web", "tool": "web_search"}, {"description": "List strings", "tool": "strings"}]}"#),
        // Critic after the failed step: not satisfied, no new steps.
        reply(r#"{"termination": {"satisfied": false, "reason": "need strings"}, "confidence_update": {"understanding_level": 0.2}}"#),
        reply(r#"{"new_observations": {"strings": [{"value": "GNU coreutils", "offset": "0x1000"}]}}"#),
        reply(r#"{"termination": {"satisfied": true, "reason": "enough"}, "confidence_update": {"understanding_level": 1.7}}"#),
    ]));
    let orch = orchestrator(provider);
    let mut state = AnalysisState::new(PathBuf::from("/bin/true"), "list strings");

    let summary = orch.run(&mut state).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::Satisfied);
    assert_eq!(state.execution_log.len(), 2);
    assert!(state.execution_log[0].error.is_some());
    assert_eq!(state.plan.steps()[0].status, StepStatus::Failed);
    assert_eq!(state.plan.steps()[1].status, StepStatus::Completed);
    assert_eq!(state.observations.strings[0].offset, 0x1000);
    assert_eq!(state.confidence.understanding_level, 1.0);
    assert_eq!(summary.cycles, 2);
}

#[tokio::test]
async fn test_plan_exhausted_reports_stopped() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        reply(r#"{"plan": [{"description": "Dump header", "tool": "hexdump"}]}"#),
        reply("{}"),
        reply(r#"{"termination": {"satisfied": false, "reason": "format unclear"}}"#),
    ]));
    let orch = orchestrator(provider);
    let mut state = AnalysisState::new(PathBuf::from("/bin/true"), "find the password");

    let summary = orch.run(&mut state).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::PlanExhausted);
    let report = format_final_report(&state, &summary, false);
    assert!(report.contains("Status: STOPPED (plan exhausted)"));
    assert!(report.contains("Reason: format unclear"));
}

#[tokio::test]
async fn test_external_cancellation() {
    let token = CancellationToken::new();
    let orch = orchestrator(Arc::new(ScriptedProvider::new(vec![]))).with_cancel_token(token.clone());
    token.cancel();
    let mut state = AnalysisState::new(PathBuf::from("/bin/true"), "goal");

    let summary = orch.run(&mut state).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert!(state.execution_log.is_empty());
}
