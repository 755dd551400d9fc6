use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;
use serde_json::{json, Value};
use crate::errors::ReverieError;
use super::provider::LLMProvider;
use super::types::{LLMResponse, ProviderFamily};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Groq chat completions (OpenAI-compatible wire format).
pub struct GroqProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GroqProvider {
    pub fn new(api_key: &str, model: Option<&str>) -> Self {
        Self::with_base_url(api_key, model, GROQ_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: Option<&str>, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.unwrap_or(ProviderFamily::Groq.default_model()).to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LLMProvider for GroqProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LLMResponse, ReverieError> {
        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(json!({"role": "system", "content": sys}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.0,
            "max_tokens": 4096,
        });

        let resp = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ReverieError::Network(format!("Groq request failed: {}", e)))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ReverieError::RateLimit {
                family: ProviderFamily::Groq,
                retry_after: parse_retry_after(resp.headers()),
                message: "Groq rate limit".into(),
            });
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ReverieError::Authentication("Invalid Groq API key".into()));
        }

        let data: Value = resp.json().await
            .map_err(|e| ReverieError::LLMApi(format!("Failed to parse Groq response: {}", e)))?;

        if let Some(error) = data.get("error") {
            return Err(ReverieError::LLMApi(
                error["message"].as_str().unwrap_or("Unknown").to_string(),
            ));
        }
        if !status.is_success() {
            return Err(ReverieError::LLMApi(format!("Groq returned HTTP {}", status)));
        }

        let content = data["choices"][0]["message"]["content"].as_str()
            .ok_or_else(|| ReverieError::LLMApi("No content in Groq response".into()))?
            .to_string();

        Ok(LLMResponse {
            content,
            input_tokens: data["usage"]["prompt_tokens"].as_u64(),
            output_tokens: data["usage"]["completion_tokens"].as_u64(),
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &str { "groq" }
    fn model_name(&self) -> &str { &self.model }
    fn family(&self) -> ProviderFamily { ProviderFamily::Groq }
}

/// `retry-after` in whole or fractional seconds.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let secs = raw.parse::<f64>().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}
