use std::sync::Arc;

use crate::errors::{ReverieError, RetryConfig};
use super::gemini::GeminiProvider;
use super::groq::GroqProvider;
use super::provider::LLMProvider;
use super::types::ProviderFamily;

/// Resolved oracle selection, built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub family: ProviderFamily,
    pub model: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub retry: RetryConfig,
}

impl OracleConfig {
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(self.family.default_model())
    }
}

pub fn create_provider(config: &OracleConfig) -> Result<Arc<dyn LLMProvider>, ReverieError> {
    if config.api_key.trim().is_empty() {
        return Err(ReverieError::Config(format!(
            "No API key for {} (set {} or pass --api-key)",
            config.family,
            config.family.api_key_env()
        )));
    }
    let model = config.model.as_deref();
    let provider: Arc<dyn LLMProvider> = match (config.family, config.base_url.as_deref()) {
        (ProviderFamily::Groq, Some(url)) => Arc::new(GroqProvider::with_base_url(&config.api_key, model, url)),
        (ProviderFamily::Groq, None) => Arc::new(GroqProvider::new(&config.api_key, model)),
        (ProviderFamily::Gemini, Some(url)) => Arc::new(GeminiProvider::with_base_url(&config.api_key, model, url)),
        (ProviderFamily::Gemini, None) => Arc::new(GeminiProvider::new(&config.api_key, model)),
    };
    Ok(provider)
}
