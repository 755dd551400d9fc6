use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::errors::{with_retry, ReverieError, RetryConfig};
use super::provider::LLMProvider;
use super::router::{create_provider, OracleConfig};

const SYSTEM_PROMPT: &str = "You are an expert reverse engineer. Answer only with JSON.";

/// Oracle access for the analysis phases: bounded retries with
/// provider-aware backoff, then schema validation and typed conversion.
#[derive(Clone)]
pub struct ResilientOracle {
    provider: Arc<dyn LLMProvider>,
    retry: RetryConfig,
}

impl ResilientOracle {
    pub fn new(provider: Arc<dyn LLMProvider>, retry: RetryConfig) -> Self {
        Self { provider, retry }
    }

    pub fn from_config(config: &OracleConfig) -> Result<Self, ReverieError> {
        Ok(Self::new(create_provider(config)?, config.retry.clone()))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Call the oracle and return a response that conforms to `schema`.
    ///
    /// Retryable failures are retried per `RetryConfig`; once attempts run
    /// out the caller gets `OracleExhausted`. Non-retryable failures are
    /// returned as-is on the first attempt.
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        operation: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<T, ReverieError> {
        debug!(
            operation,
            provider = self.provider.provider_name(),
            family = %self.provider.family(),
            model = self.provider.model_name(),
            prompt_chars = prompt.len(),
            "Invoking oracle"
        );

        let result = with_retry(operation, &self.retry, move || async move {
            let value = self.provider
                .complete_structured(prompt, schema, Some(SYSTEM_PROMPT))
                .await?;
            validate_response(schema, &value)?;
            serde_json::from_value::<T>(value).map_err(|e| {
                ReverieError::OutputValidation(format!("Response does not fit {}: {}", operation, e))
            })
        }).await;

        match result {
            Ok(v) => Ok(v),
            Err(e) if e.classify().retryable => {
                let attempts = self.retry.max_retries + 1;
                error!(operation, attempts, error = %e, "Oracle call exhausted");
                Err(ReverieError::OracleExhausted {
                    operation: operation.to_string(),
                    attempts,
                    last_error: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Check a response against its JSON schema.
pub fn validate_response(schema: &Value, value: &Value) -> Result<(), ReverieError> {
    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|e| ReverieError::Config(format!("Schema compilation error: {}", e)))?;
    if let Err(errors) = compiled.validate(value) {
        let messages: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        return Err(ReverieError::OutputValidation(messages.join("; ")));
    }
    Ok(())
}
