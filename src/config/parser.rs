use std::path::Path;
use crate::errors::ReverieError;
use crate::llm::ProviderFamily;
use crate::process::MAX_PAYLOAD_BYTES;
use super::types::ReverieConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::warn;

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<ReverieConfig, ReverieError> {
    if !path.exists() {
        return Err(ReverieError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(ReverieError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

pub fn parse_config_str(content: &str) -> Result<ReverieConfig, ReverieError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    // An empty document is a valid, empty config.
    if yaml.is_null() {
        return Ok(ReverieConfig::default());
    }

    validate_schema(&yaml)?;

    let config: ReverieConfig = serde_yaml::from_value(yaml)?;
    validate_semantics(&config)?;
    Ok(config)
}

/// Validate config against the JSON schema. Advisory: violations are logged.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), ReverieError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| ReverieError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| ReverieError::Config(format!("Schema compilation error: {}", e)))?;

    if let Err(errors) = compiled.validate(&json_value) {
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

fn validate_semantics(config: &ReverieConfig) -> Result<(), ReverieError> {
    if let Some(oracle) = &config.oracle {
        if let Some(provider) = &oracle.provider {
            if ProviderFamily::parse(provider).is_none() {
                return Err(ReverieError::Config(format!(
                    "Unknown provider '{}' (expected groq or gemini)",
                    provider
                )));
            }
        }
        if oracle.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            warn!("API key stored in config file; prefer the provider environment variable");
        }
    }

    if let Some(exec) = &config.execution {
        if exec.timeout_secs == Some(0) {
            return Err(ReverieError::Config("execution.timeout_secs must be positive".into()));
        }
        if exec.debugger_timeout_secs == Some(0) {
            return Err(ReverieError::Config("execution.debugger_timeout_secs must be positive".into()));
        }
        match exec.max_payload_bytes {
            Some(0) => {
                return Err(ReverieError::Config("execution.max_payload_bytes must be positive".into()));
            }
            Some(n) if n > MAX_PAYLOAD_BYTES => {
                return Err(ReverieError::Config(format!(
                    "execution.max_payload_bytes must be at most {} (got {})",
                    MAX_PAYLOAD_BYTES, n
                )));
            }
            _ => {}
        }
    }

    if let Some(analysis) = &config.analysis {
        if analysis.max_cycles == Some(0) {
            return Err(ReverieError::Config("analysis.max_cycles must be positive".into()));
        }
        if analysis.strings_min_len == Some(0) {
            return Err(ReverieError::Config("analysis.strings_min_len must be positive".into()));
        }
    }

    Ok(())
}
