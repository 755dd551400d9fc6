use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use crate::errors::ReverieError;
use crate::process::InteractiveRunner;
use crate::prompts::PromptVariables;
use crate::utils::text::clean_terminal_output;
use crate::utils::truncation::truncate_output;
use super::{Tool, ToolArgs, ToolKind, ToolOutput, ToolRequest, TranslationContext};

#[derive(Debug, Deserialize)]
struct RunTranslation {
    #[serde(default)]
    cmd_args: Vec<String>,
    #[serde(default)]
    stdin_data: Option<String>,
}

/// Runs the target itself under a pseudo-terminal.
#[derive(Default)]
pub struct RunBinary {
    runner: InteractiveRunner,
}

impl RunBinary {
    pub fn new(runner: InteractiveRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for RunBinary {
    fn name(&self) -> &'static str {
        "run_binary"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Translated
    }

    fn default_args(&self) -> ToolArgs {
        ToolArgs::RunBinary { cmd_args: Vec::new(), stdin_data: None }
    }

    async fn translate(&self, ctx: &TranslationContext<'_>) -> Result<ToolArgs, ReverieError> {
        let prompt = ctx.prompts.render("run_translation", &PromptVariables {
            binary_path: ctx.binary_path.display().to_string(),
            action: Some(ctx.action.to_string()),
            findings: Some(ctx.findings.clone()),
            last_output: ctx.last_output.map(truncate_output),
            ..Default::default()
        })?;
        let schema = json!({
            "type": "object",
            "properties": {
                "cmd_args": { "type": "array", "items": { "type": "string" } },
                "stdin_data": { "type": ["string", "null"] }
            }
        });
        let t: RunTranslation = ctx.oracle.invoke("translate_run", &prompt, &schema).await?;
        Ok(ToolArgs::RunBinary { cmd_args: t.cmd_args, stdin_data: t.stdin_data })
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<ToolOutput, ReverieError> {
        let (cmd_args, stdin_data) = match &request.args {
            ToolArgs::RunBinary { cmd_args, stdin_data } => (cmd_args.as_slice(), stdin_data.as_deref()),
            _ => (&[][..], None),
        };
        let report = self.runner.run(&request.binary_path, cmd_args, stdin_data).await?;
        let rendered = clean_terminal_output(&report.render());

        if report.timed_out() {
            let error = format!("Binary execution timed out after {}s", self.runner.timeout().as_secs());
            Ok(ToolOutput::failed(Some(rendered), error))
        } else {
            Ok(ToolOutput::text(rendered))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    fn script(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("target.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_completed_run_renders_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let target = script(&dir, "read pw; [ \"$pw\" = \"open sesame\" ] && echo Access Granted");
        let tool = RunBinary::new(InteractiveRunner::new(Duration::from_secs(5)));
        let req = ToolRequest {
            binary_path: target,
            args: ToolArgs::RunBinary { cmd_args: vec![], stdin_data: Some("open sesame".into()) },
        };
        let out = tool.invoke(&req).await.unwrap();
        assert!(out.error.is_none());
        let text = out.output.unwrap();
        assert!(text.starts_with("Exit Code: 0"), "{}", text);
        assert!(text.contains("Access Granted"));
        assert!(!text.contains('\r'));
    }

    #[tokio::test]
    async fn test_timeout_keeps_transcript_and_sets_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = script(&dir, "printf 'Enter key: '; sleep 30");
        let tool = RunBinary::new(InteractiveRunner::new(Duration::from_secs(1)));
        let req = ToolRequest { binary_path: target, args: tool.default_args() };
        let out = tool.invoke(&req).await.unwrap();
        assert!(out.error.unwrap().contains("timed out"));
        assert!(out.output.unwrap().contains("Enter key: "));
    }
}
