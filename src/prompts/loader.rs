use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use regex::Regex;
use crate::errors::ReverieError;
use tracing::{debug, warn};

const PLANNER: &str = include_str!("../../prompts/planner.txt");
const OBSERVATION: &str = include_str!("../../prompts/observation.txt");
const CRITIC: &str = include_str!("../../prompts/critic.txt");
const GDB_TRANSLATION: &str = include_str!("../../prompts/gdb_translation.txt");
const RUN_TRANSLATION: &str = include_str!("../../prompts/run_translation.txt");

static PLACEHOLDER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{[A-Z_]+\}\}").ok());

/// Variables available for template interpolation in prompt files.
#[derive(Debug, Clone, Default)]
pub struct PromptVariables {
    pub binary_path: String,
    pub goal: String,
    pub target_info: Option<String>,
    pub constraints: Option<String>,
    pub findings: Option<String>,
    pub plan_status: Option<String>,
    pub confidence: Option<String>,
    pub recent_errors: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<String>,
    pub tool_output: Option<String>,
    pub action: Option<String>,
    pub last_output: Option<String>,
}

/// Serves prompt templates, preferring `<override_dir>/<name>.txt` over the
/// copies compiled into the binary.
#[derive(Debug, Clone, Default)]
pub struct PromptLoader {
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = &override_dir {
            debug!(dir = %dir.display(), "PromptLoader using override directory");
        }
        Self { override_dir }
    }

    /// Load a prompt template by name (without .txt extension).
    pub fn load(&self, prompt_name: &str) -> Result<String, ReverieError> {
        if let Some(dir) = &self.override_dir {
            let file_path = dir.join(format!("{}.txt", prompt_name));
            if file_path.exists() {
                return std::fs::read_to_string(&file_path).map_err(|e| {
                    ReverieError::Prompt(format!("Failed to read prompt {}: {}", file_path.display(), e))
                });
            }
        }
        embedded(prompt_name)
            .map(str::to_string)
            .ok_or_else(|| ReverieError::Prompt(format!("Unknown prompt: {}", prompt_name)))
    }

    /// Load and interpolate in one go.
    pub fn render(&self, prompt_name: &str, vars: &PromptVariables) -> Result<String, ReverieError> {
        let template = self.load(prompt_name)?;
        Ok(self.interpolate(&template, vars))
    }

    /// Replace {{VARIABLE}} placeholders with values from PromptVariables.
    /// None values become "None". Unknown placeholders are removed.
    pub fn interpolate(&self, template: &str, vars: &PromptVariables) -> String {
        let mut result = template.to_string();

        let replacements: &[(&str, &str)] = &[
            ("{{BINARY_PATH}}", &vars.binary_path),
            ("{{GOAL}}", &vars.goal),
        ];
        for (placeholder, value) in replacements {
            result = result.replace(placeholder, value);
        }

        let optional_replacements: &[(&str, &Option<String>)] = &[
            ("{{TARGET_INFO}}", &vars.target_info),
            ("{{CONSTRAINTS}}", &vars.constraints),
            ("{{FINDINGS}}", &vars.findings),
            ("{{PLAN_STATUS}}", &vars.plan_status),
            ("{{CONFIDENCE}}", &vars.confidence),
            ("{{RECENT_ERRORS}}", &vars.recent_errors),
            ("{{TOOL_NAME}}", &vars.tool_name),
            ("{{TOOL_INPUT}}", &vars.tool_input),
            ("{{TOOL_OUTPUT}}", &vars.tool_output),
            ("{{ACTION}}", &vars.action),
            ("{{LAST_OUTPUT}}", &vars.last_output),
        ];
        for (placeholder, value) in optional_replacements {
            let replacement = value.as_deref().filter(|v| !v.trim().is_empty()).unwrap_or("None");
            result = result.replace(placeholder, replacement);
        }

        if let Some(re) = PLACEHOLDER_RE.as_ref() {
            if re.is_match(&result) {
                warn!("Prompt template contains unknown placeholders; removing them");
                result = re.replace_all(&result, "").into_owned();
            }
        }

        result
    }

    pub fn has_prompt(&self, prompt_name: &str) -> bool {
        self.override_dir
            .as_ref()
            .is_some_and(|d| d.join(format!("{}.txt", prompt_name)).exists())
            || embedded(prompt_name).is_some()
    }

    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }
}

fn embedded(prompt_name: &str) -> Option<&'static str> {
    match prompt_name {
        "planner" => Some(PLANNER),
        "observation" => Some(OBSERVATION),
        "critic" => Some(CRITIC),
        "gdb_translation" => Some(GDB_TRANSLATION),
        "run_translation" => Some(RUN_TRANSLATION),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_embedded_prompts_present() {
        let loader = PromptLoader::default();
        for name in ["planner", "observation", "critic", "gdb_translation", "run_translation"] {
            assert!(loader.has_prompt(name), "missing {}", name);
            assert!(!loader.load(name).unwrap().is_empty());
        }
    }

    #[test]
    fn test_override_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("planner.txt"), "Plan for {{GOAL}}").unwrap();
        let loader = PromptLoader::new(Some(dir.path().to_path_buf()));
        assert_eq!(loader.load("planner").unwrap(), "Plan for {{GOAL}}");
        // Falls back to the embedded copy for names not overridden.
        assert!(loader.load("critic").unwrap().contains("critic"));
    }

    #[test]
    fn test_interpolate() {
        let loader = PromptLoader::default();
        let vars = PromptVariables {
            binary_path: "/bin/true".to_string(),
            goal: "find the flag".to_string(),
            action: Some("run it".to_string()),
            ..Default::default()
        };
        let template = "Binary: {{BINARY_PATH}}, Goal: {{GOAL}}, Action: {{ACTION}}, Last: {{LAST_OUTPUT}}{{BOGUS}}";
        assert_eq!(
            loader.interpolate(template, &vars),
            "Binary: /bin/true, Goal: find the flag, Action: run it, Last: None"
        );
    }

    #[test]
    fn test_unknown_prompt_returns_error() {
        let loader = PromptLoader::default();
        assert!(matches!(loader.load("nonexistent"), Err(ReverieError::Prompt(_))));
    }
}
