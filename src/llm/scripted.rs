use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use crate::errors::ReverieError;
use super::provider::LLMProvider;
use super::types::{LLMResponse, ProviderFamily};

type ScriptEntry = Result<String, ReverieError>;

/// In-memory provider that replays canned replies in call order.
///
/// Once the script runs out every call fails with the `on_empty` error.
/// Used for offline runs and tests.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ScriptEntry>>,
    on_empty: fn() -> ReverieError,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<ScriptEntry>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            on_empty: || ReverieError::LLMApi("scripted provider has no more replies".into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every call fails with `make_error()`.
    pub fn failing(make_error: fn() -> ReverieError) -> Self {
        Self { on_empty: make_error, ..Self::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Every prompt received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str, _system: Option<&str>) -> Result<LLMResponse, ReverieError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self.replies.lock()
            .map_err(|_| ReverieError::Internal("scripted provider lock poisoned".into()))?
            .pop_front();
        match next {
            Some(Ok(content)) => Ok(LLMResponse {
                content,
                input_tokens: None,
                output_tokens: None,
                model: "scripted".into(),
            }),
            Some(Err(e)) => Err(e),
            None => Err((self.on_empty)()),
        }
    }

    fn provider_name(&self) -> &str { "scripted" }
    fn model_name(&self) -> &str { "scripted" }
    fn family(&self) -> ProviderFamily { ProviderFamily::Groq }
}
