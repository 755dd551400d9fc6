pub mod debugger;
pub mod dispatch;
pub mod file_probe;
pub mod hexdump;
pub mod registry;
pub mod run_binary;
pub mod strings;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::errors::ReverieError;
use crate::llm::ResilientOracle;
use crate::prompts::PromptLoader;

pub use dispatch::ToolDispatcher;
pub use registry::ToolRegistry;

/// Whether a tool's arguments are fixed or derived from the step's action text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Direct,
    Translated,
}

/// Structured arguments for one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolArgs {
    PathOnly,
    Strings { min_len: usize },
    Hexdump { offset: u64, length: usize },
    Gdb { commands: Vec<String> },
    RunBinary {
        cmd_args: Vec<String>,
        stdin_data: Option<String>,
    },
}

/// Exact input recorded in the execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub binary_path: PathBuf,
    pub args: ToolArgs,
}

/// What a tool produced. A run can have both: a timed-out interactive run
/// keeps its partial transcript as output and still fails the step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub output: Option<String>,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn text(output: impl Into<String>) -> Self {
        Self { output: Some(output.into()), error: None }
    }

    pub fn failed(output: Option<String>, error: impl Into<String>) -> Self {
        Self { output, error: Some(error.into()) }
    }
}

/// Inputs for turning a step's action text into tool arguments.
pub struct TranslationContext<'a> {
    pub action: &'a str,
    pub binary_path: &'a Path,
    pub findings: String,
    pub last_output: Option<&'a str>,
    pub oracle: &'a ResilientOracle,
    pub prompts: &'a PromptLoader,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ToolKind {
        ToolKind::Direct
    }

    /// Arguments for direct tools, and the fallback for translated ones.
    fn default_args(&self) -> ToolArgs;

    /// Derive arguments from the step's action text. Direct tools ignore it.
    async fn translate(&self, _ctx: &TranslationContext<'_>) -> Result<ToolArgs, ReverieError> {
        Ok(self.default_args())
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<ToolOutput, ReverieError>;
}

/// Map an oracle-proposed tool name onto a registered capability name.
pub fn canonical_tool_name(raw: &str) -> String {
    let name = raw.trim().to_ascii_lowercase();
    if name.contains("strings") {
        "strings".to_string()
    } else if name.contains("file") {
        "file".to_string()
    } else if name.contains("hexdump") {
        "hexdump".to_string()
    } else if name.contains("run") {
        "run_binary".to_string()
    } else if name.contains("gdb") {
        "gdb".to_string()
    } else {
        name
    }
}

/// Existing regular file, for tools that only read the target.
pub(crate) fn ensure_readable(path: &Path) -> Result<(), ReverieError> {
    if !path.is_absolute() {
        return Err(ReverieError::InvalidTarget(format!("path must be absolute: {}", path.display())));
    }
    if !path.is_file() {
        return Err(ReverieError::InvalidTarget(format!("not found: {}", path.display())));
    }
    Ok(())
}
