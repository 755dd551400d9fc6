use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::commands::AnalyzeArgs;
use crate::cli::progress::spawn_progress_printer;
use crate::config::{self, Overrides, ReverieConfig};
use crate::errors::ReverieError;
use crate::llm::ResilientOracle;
use crate::pipeline::{AnalysisOrchestrator, AnalysisState};
use crate::prompts::PromptLoader;
use crate::reporting::format_final_report;
use crate::tools::ToolRegistry;

pub async fn handle_analyze(args: AnalyzeArgs, quiet: bool, color: bool) -> Result<(), ReverieError> {
    let binary_path = prepare_target(&args.path)?;
    let goal = args.prompt.trim();
    if goal.is_empty() {
        return Err(ReverieError::Config("Analysis goal (--prompt) must not be empty".into()));
    }

    let file_config = match &args.config {
        Some(path) => config::parse_config(Path::new(path)).await?,
        None => ReverieConfig::default(),
    };
    let overrides = Overrides {
        provider: args.provider.clone(),
        model: args.model.clone(),
        api_key: args.api_key.clone(),
        max_cycles: args.max_cycles,
        exec_timeout_secs: args.exec_timeout,
    };
    let settings = config::resolve(&file_config, &overrides)?;

    let oracle = ResilientOracle::from_config(&settings.oracle)?;
    let prompts = PromptLoader::new(settings.prompts_dir.clone());
    let registry = ToolRegistry::standard(&settings.tools);

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current phase");
            ctrl_c_token.cancel();
        }
    });

    let mut orchestrator = AnalysisOrchestrator::new(oracle, prompts, registry)
        .with_max_cycles(settings.max_cycles)
        .with_cancel_token(cancel);
    let mut printer = None;
    if !quiet {
        let (tx, rx) = mpsc::unbounded_channel();
        orchestrator = orchestrator.with_event_channel(tx);
        printer = Some(spawn_progress_printer(rx, color));
    }

    let mut state = AnalysisState::new(binary_path, goal);
    let summary = orchestrator.run(&mut state).await?;
    // Dropping the orchestrator closes the event channel so the printer drains and exits.
    drop(orchestrator);
    if let Some(handle) = printer {
        let _ = handle.await;
    }

    if let Some(out) = &args.state_out {
        write_state(&state, Path::new(out)).await?;
        info!(path = %out, "Final state written");
    }

    println!("{}", format_final_report(&state, &summary, color));
    Ok(())
}

/// Resolve the target to an absolute path of a readable regular file.
pub fn prepare_target(raw: &str) -> Result<PathBuf, ReverieError> {
    if raw.trim().is_empty() {
        return Err(ReverieError::InvalidTarget("no binary path given".into()));
    }
    let path = std::fs::canonicalize(raw)
        .map_err(|_| ReverieError::InvalidTarget(format!("not found: {}", raw)))?;
    if !path.is_file() {
        return Err(ReverieError::InvalidTarget(format!("not a regular file: {}", path.display())));
    }
    std::fs::File::open(&path)
        .map_err(|e| ReverieError::InvalidTarget(format!("unreadable: {} ({})", path.display(), e)))?;
    Ok(path)
}

pub async fn write_state(state: &AnalysisState, path: &Path) -> Result<(), ReverieError> {
    let json = serde_json::to_string_pretty(state)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_target_missing() {
        let err = prepare_target("/definitely/not/here").unwrap_err();
        assert!(matches!(err, ReverieError::InvalidTarget(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_prepare_target_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare_target(dir.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ReverieError::InvalidTarget(msg) if msg.contains("regular file")));
    }

    #[test]
    fn test_prepare_target_makes_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sample.bin");
        std::fs::write(&file, b"\x7fELF").unwrap();
        let resolved = prepare_target(file.to_str().unwrap()).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("sample.bin"));
    }

    #[tokio::test]
    async fn test_write_state_round_trips_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("state.json");
        let state = AnalysisState::new(PathBuf::from("/bin/true"), "goal");
        write_state(&state, &out).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(value["run_id"], state.run_id.as_str());
        assert_eq!(value["goal"]["primary_objective"], "goal");
    }
}
