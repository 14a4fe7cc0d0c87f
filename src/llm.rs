//! Language-model client
//!
//! The assistant talks to an OpenAI-compatible chat-completions API (Groq by
//! default). The trait has exactly one operation per call site so tests can
//! substitute a deterministic stub for either stage independently.

use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_CHAT_MODEL: &str = "llama-3.1-8b-instant";

/// Bounded wait on every model call; a timeout is treated downstream exactly
/// like malformed output.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PLAN_TEMPERATURE: f64 = 0.1;
const PLAN_MAX_TOKENS: u32 = 500;
const SUMMARY_TEMPERATURE: f64 = 0.3;
const SUMMARY_MAX_TOKENS: u32 = 220;

#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Turn (question + retrieved context) into a Query Plan JSON string.
    async fn compile_plan(&self, system: &str, user: &str) -> Result<String>;

    /// Turn (question + plan + results) into a short plain-text explanation.
    async fn summarize(&self, system: &str, user: &str) -> Result<String>;
}

pub struct ChatClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AssistantError::Config(
                "Chat model API key is empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AssistantError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_key,
            base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        json_object: bool,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        if json_object {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Llm(format!("Chat API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AssistantError::Llm(format!(
                "Chat API error ({}): {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AssistantError::Llm(format!("Failed to parse chat response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AssistantError::Llm("No content in chat response".to_string()))?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl CompletionModel for ChatClient {
    async fn compile_plan(&self, system: &str, user: &str) -> Result<String> {
        self.chat(system, user, true, PLAN_TEMPERATURE, PLAN_MAX_TOKENS)
            .await
    }

    async fn summarize(&self, system: &str, user: &str) -> Result<String> {
        self.chat(system, user, false, SUMMARY_TEMPERATURE, SUMMARY_MAX_TOKENS)
            .await
    }
}
