use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use crate::errors::ReverieError;
use super::groq::parse_retry_after;
use super::provider::LLMProvider;
use super::types::{LLMResponse, ProviderFamily};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: &str, model: Option<&str>) -> Self {
        Self::with_base_url(api_key, model, GEMINI_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: Option<&str>, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.unwrap_or(ProviderFamily::Gemini.default_model()).to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LLMResponse, ReverieError> {
        let text = match system {
            Some(sys) => format!("System: {}\n\n{}", sys, prompt),
            None => prompt.to_string(),
        };

        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": text}]}],
            "generationConfig": {
                "temperature": 0.0,
                "maxOutputTokens": 16384,
            }
        });

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let resp = self.client.post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReverieError::Network(format!("Gemini request failed: {}", e)))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ReverieError::RateLimit {
                family: ProviderFamily::Gemini,
                retry_after: parse_retry_after(resp.headers()),
                message: "Gemini resource exhausted".into(),
            });
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ReverieError::Authentication("Invalid Google API key".into()));
        }

        let data: Value = resp.json().await
            .map_err(|e| ReverieError::LLMApi(format!("Parse error: {}", e)))?;

        if let Some(error) = data.get("error") {
            return Err(ReverieError::LLMApi(error["message"].as_str().unwrap_or("Unknown").to_string()));
        }

        let content = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| ReverieError::LLMApi("No content in Gemini response".into()))?
            .to_string();

        Ok(LLMResponse {
            content,
            input_tokens: data["usageMetadata"]["promptTokenCount"].as_u64(),
            output_tokens: data["usageMetadata"]["candidatesTokenCount"].as_u64(),
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &str { "gemini" }
    fn model_name(&self) -> &str { &self.model }
    fn family(&self) -> ProviderFamily { ProviderFamily::Gemini }
}
