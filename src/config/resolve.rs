use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{ReverieError, RetryConfig};
use crate::llm::{OracleConfig, ProviderFamily};
use crate::process::MAX_PAYLOAD_BYTES;
use crate::tools::registry::ToolSettings;
use super::types::ReverieConfig;

/// Values given on the command line. They win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub max_cycles: Option<u32>,
    pub exec_timeout_secs: Option<u64>,
}

/// Everything the analysis loop needs, with precedence applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub oracle: OracleConfig,
    pub tools: ToolSettings,
    pub max_cycles: u32,
    pub prompts_dir: Option<PathBuf>,
}

/// Merge CLI flags, config file and environment (in that order of precedence).
pub fn resolve(config: &ReverieConfig, overrides: &Overrides) -> Result<Settings, ReverieError> {
    resolve_with_env(config, overrides, |key| std::env::var(key).ok())
}

pub fn resolve_with_env<F>(config: &ReverieConfig, overrides: &Overrides, env: F) -> Result<Settings, ReverieError>
where
    F: Fn(&str) -> Option<String>,
{
    let oracle_section = config.oracle.clone().unwrap_or_default();
    let exec = config.execution.clone().unwrap_or_default();
    let analysis = config.analysis.clone().unwrap_or_default();

    let family = match overrides.provider.as_ref().or(oracle_section.provider.as_ref()) {
        Some(name) => ProviderFamily::parse(name).ok_or_else(|| {
            ReverieError::Config(format!("Unknown provider '{}' (expected groq or gemini)", name))
        })?,
        None => ProviderFamily::default(),
    };

    let api_key = overrides
        .api_key
        .clone()
        .or(oracle_section.api_key)
        .filter(|k| !k.trim().is_empty())
        .or_else(|| env(family.api_key_env()))
        .unwrap_or_default();

    let retry = RetryConfig {
        max_retries: oracle_section.max_retries.unwrap_or(RetryConfig::default().max_retries),
        ..RetryConfig::default()
    };

    let oracle = OracleConfig {
        family,
        model: overrides.model.clone().or(oracle_section.model),
        api_key,
        base_url: oracle_section.base_url,
        retry,
    };

    let defaults = ToolSettings::default();
    let exec_timeout = overrides
        .exec_timeout_secs
        .or(exec.timeout_secs)
        .map(Duration::from_secs)
        .unwrap_or(defaults.exec_timeout);
    if exec_timeout.is_zero() {
        return Err(ReverieError::Config("Execution timeout must be positive".into()));
    }

    let max_payload_bytes = exec.max_payload_bytes.unwrap_or(defaults.max_payload_bytes);
    if max_payload_bytes == 0 || max_payload_bytes > MAX_PAYLOAD_BYTES {
        return Err(ReverieError::Config(format!(
            "max_payload_bytes must be between 1 and {}",
            MAX_PAYLOAD_BYTES
        )));
    }

    let tools = ToolSettings {
        strings_min_len: analysis.strings_min_len.unwrap_or(defaults.strings_min_len),
        strings_max_lines: analysis.strings_max_lines.unwrap_or(defaults.strings_max_lines),
        exec_timeout,
        max_payload_bytes,
        debugger_timeout: exec
            .debugger_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.debugger_timeout),
    };

    let max_cycles = overrides
        .max_cycles
        .or(analysis.max_cycles)
        .unwrap_or(crate::pipeline::DEFAULT_MAX_CYCLES);
    if max_cycles == 0 {
        return Err(ReverieError::Config("max_cycles must be positive".into()));
    }

    Ok(Settings {
        oracle,
        tools,
        max_cycles,
        prompts_dir: analysis.prompts_dir.map(PathBuf::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_config_str;
    use crate::config::types::ExecutionSection;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_config() {
        let settings = resolve_with_env(&ReverieConfig::default(), &Overrides::default(), no_env).unwrap();
        assert_eq!(settings.oracle.family, ProviderFamily::Groq);
        assert_eq!(settings.oracle.retry.max_retries, 3);
        assert_eq!(settings.max_cycles, 25);
        assert_eq!(settings.tools.exec_timeout, Duration::from_secs(10));
        assert_eq!(settings.tools.max_payload_bytes, 4096);
        assert!(settings.oracle.api_key.is_empty());
    }

    #[test]
    fn test_api_key_from_provider_env() {
        let config = parse_config_str("oracle:\n  provider: gemini\n").unwrap();
        let env = |key: &str| (key == "GOOGLE_API_KEY").then(|| "g-key".to_string());
        let settings = resolve_with_env(&config, &Overrides::default(), env).unwrap();
        assert_eq!(settings.oracle.family, ProviderFamily::Gemini);
        assert_eq!(settings.oracle.api_key, "g-key");
    }

    #[test]
    fn test_cli_overrides_file() {
        let config = parse_config_str(
            "oracle:\n  provider: gemini\n  model: from-file\n  api_key: file-key\nexecution:\n  timeout_secs: 5\nanalysis:\n  max_cycles: 7\n",
        )
        .unwrap();
        let overrides = Overrides {
            provider: Some("groq".into()),
            model: Some("from-cli".into()),
            api_key: Some("cli-key".into()),
            max_cycles: Some(3),
            exec_timeout_secs: Some(2),
        };
        let settings = resolve_with_env(&config, &overrides, no_env).unwrap();
        assert_eq!(settings.oracle.family, ProviderFamily::Groq);
        assert_eq!(settings.oracle.model.as_deref(), Some("from-cli"));
        assert_eq!(settings.oracle.api_key, "cli-key");
        assert_eq!(settings.max_cycles, 3);
        assert_eq!(settings.tools.exec_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_payload_limit_is_capped() {
        let config = ReverieConfig {
            execution: Some(ExecutionSection { max_payload_bytes: Some(8192), ..Default::default() }),
            ..Default::default()
        };
        let err = resolve_with_env(&config, &Overrides::default(), no_env).unwrap_err();
        assert!(matches!(err, ReverieError::Config(msg) if msg.contains("4096")));
    }

    #[test]
    fn test_file_values_used_when_no_flags() {
        let config = parse_config_str("execution:\n  timeout_secs: 5\n  max_payload_bytes: 100\nanalysis:\n  prompts_dir: /tmp/p\n").unwrap();
        let settings = resolve_with_env(&config, &Overrides::default(), no_env).unwrap();
        assert_eq!(settings.tools.exec_timeout, Duration::from_secs(5));
        assert_eq!(settings.tools.max_payload_bytes, 100);
        assert_eq!(settings.prompts_dir, Some(PathBuf::from("/tmp/p")));
    }

    #[test]
    fn test_unknown_cli_provider_rejected() {
        let overrides = Overrides { provider: Some("openai".into()), ..Default::default() };
        assert!(matches!(
            resolve_with_env(&ReverieConfig::default(), &overrides, no_env),
            Err(ReverieError::Config(_))
        ));
    }

    #[test]
    fn test_zero_overrides_rejected() {
        let overrides = Overrides { exec_timeout_secs: Some(0), ..Default::default() };
        assert!(resolve_with_env(&ReverieConfig::default(), &overrides, no_env).is_err());
        let overrides = Overrides { max_cycles: Some(0), ..Default::default() };
        assert!(resolve_with_env(&ReverieConfig::default(), &overrides, no_env).is_err());
    }
}
