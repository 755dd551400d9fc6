use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use crate::errors::ReverieError;
use crate::process::run_batch;
use crate::prompts::PromptVariables;
use crate::utils::text::clean_terminal_output;
use crate::utils::truncation::truncate_output;
use super::{ensure_readable, Tool, ToolArgs, ToolKind, ToolOutput, ToolRequest, TranslationContext};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct GdbTranslation {
    commands: Vec<String>,
}

/// gdb in batch mode, one `-ex` per command.
pub struct Debugger {
    program: String,
    timeout: Duration,
}

impl Default for Debugger {
    fn default() -> Self {
        Self { program: "gdb".to_string(), timeout: DEFAULT_TIMEOUT }
    }
}

impl Debugger {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, ..Default::default() }
    }

    pub fn fallback_commands() -> Vec<String> {
        ["break main", "run", "quit"].iter().map(|c| c.to_string()).collect()
    }

    fn command_line(commands: &[String], path: &Path) -> Vec<String> {
        let mut args = vec!["--batch".to_string(), "--quiet".to_string()];
        for cmd in commands {
            args.push("-ex".to_string());
            args.push(cmd.clone());
        }
        args.push(path.display().to_string());
        args
    }
}

#[async_trait]
impl Tool for Debugger {
    fn name(&self) -> &'static str {
        "gdb"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Translated
    }

    fn default_args(&self) -> ToolArgs {
        ToolArgs::Gdb { commands: Self::fallback_commands() }
    }

    async fn translate(&self, ctx: &TranslationContext<'_>) -> Result<ToolArgs, ReverieError> {
        let prompt = ctx.prompts.render("gdb_translation", &PromptVariables {
            binary_path: ctx.binary_path.display().to_string(),
            action: Some(ctx.action.to_string()),
            findings: Some(ctx.findings.clone()),
            last_output: ctx.last_output.map(truncate_output),
            ..Default::default()
        })?;
        let schema = json!({
            "type": "object",
            "required": ["commands"],
            "properties": {
                "commands": { "type": "array", "items": { "type": "string" }, "minItems": 1 }
            }
        });
        let translation: GdbTranslation = ctx.oracle.invoke("translate_gdb", &prompt, &schema).await?;
        Ok(ToolArgs::Gdb { commands: translation.commands })
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<ToolOutput, ReverieError> {
        ensure_readable(&request.binary_path)?;
        let commands = match &request.args {
            ToolArgs::Gdb { commands } if !commands.is_empty() => commands.clone(),
            _ => Self::fallback_commands(),
        };
        debug!(?commands, "Running debugger batch");

        let args = Self::command_line(&commands, &request.binary_path);
        let out = run_batch(&self.program, &args, request.binary_path.parent(), self.timeout).await?;

        let stdout = clean_terminal_output(&out.stdout);
        if out.success() {
            Ok(ToolOutput::text(stdout.trim()))
        } else {
            let code = out.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into());
            Ok(ToolOutput::text(format!(
                "GDB Error (Exit {}):\nSTDOUT: {}\nSTDERR: {}",
                code,
                stdout.trim(),
                clean_terminal_output(&out.stderr).trim()
            )))
        }
    }
}
