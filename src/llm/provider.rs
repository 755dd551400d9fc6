use async_trait::async_trait;
use crate::errors::ReverieError;
use super::json::parse_json_response;
use super::types::{LLMResponse, ProviderFamily};

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Free-form text completion
    async fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<LLMResponse, ReverieError>;

    /// Structured JSON completion. The schema is embedded in the prompt;
    /// conformance is checked by the caller.
    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
        system: Option<&str>,
    ) -> Result<serde_json::Value, ReverieError> {
        let augmented = format!(
            "{}\n\nRespond with ONLY valid JSON matching this schema:\n{}",
            prompt,
            serde_json::to_string_pretty(schema)?
        );
        let response = self.complete(&augmented, system).await?;
        parse_json_response(&response.content, self.provider_name())
    }

    /// Provider name for logging
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;

    fn family(&self) -> ProviderFamily;
}
