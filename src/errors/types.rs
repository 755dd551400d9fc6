use std::time::Duration;
use thiserror::Error;
use crate::llm::types::ProviderFamily;

#[derive(Debug, Error)]
pub enum ReverieError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("Rate limited by {family}: {message}")]
    RateLimit {
        family: ProviderFamily,
        retry_after: Option<Duration>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Output validation error: {0}")]
    OutputValidation(String),

    #[error("Oracle call '{operation}' failed after {attempts} attempts: {last_error}")]
    OracleExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Input payload too large: {size} bytes (max {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Failed to spawn process: {0}")]
    SpawnFailure(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Unsupported tool: {0}")]
    UnsupportedTool(String),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
