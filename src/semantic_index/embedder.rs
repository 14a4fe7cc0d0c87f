//! Embedder
//!
//! Embeds documentation and questions through an OpenAI-compatible
//! embeddings API. A failing embedder is a configuration problem (missing
//! model or credentials), surfaced at index build time, never per question.

use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_EMBEDDINGS_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDINGS_MODEL: &str = "text-embedding-3-small";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

pub struct HttpEmbedder {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AssistantError::Config(
                "Embeddings API key is empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AssistantError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_key,
            base_url: DEFAULT_EMBEDDINGS_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDINGS_MODEL.to_string(),
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
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Llm(format!("Embedding API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AssistantError::Llm(format!(
                "Embedding API error ({}): {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = response.json().await.map_err(|e| {
            AssistantError::Llm(format!("Failed to parse embedding response: {}", e))
        })?;

        let data = response_json
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|arr| arr.first())
            .ok_or_else(|| AssistantError::Llm("No embedding data in response".to_string()))?;

        let embedding: Vec<f32> = data
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| AssistantError::Llm("No embedding vector in response".to_string()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        Ok(embedding)
    }
}
