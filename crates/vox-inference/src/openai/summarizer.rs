//! OpenAI-compatible summarization backend.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use vox_core::defaults::{
    KEY_TOPICS_MAX_TOKENS, SUMMARY_MAX_TOKENS, SUMMARY_MODEL, SUMMARY_TIMEOUT_SECS,
};
use vox_core::{Error, Result};

use super::error::error_from_response;
use super::types::*;
use crate::summarization::{
    key_topics_prompt, summary_prompt, SummarizationBackend, KEY_TOPICS_SYSTEM_PROMPT,
    SUMMARY_SYSTEM_PROMPT,
};

/// Default OpenAI API endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Configuration for OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for generation.
    pub gen_model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: None,
            gen_model: SUMMARY_MODEL.to_string(),
            timeout_seconds: SUMMARY_TIMEOUT_SECS,
        }
    }
}

impl OpenAIConfig {
    /// Read the configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|s| !s.is_empty()),
            gen_model: std::env::var("OPENAI_GEN_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| SUMMARY_MODEL.to_string()),
            timeout_seconds: std::env::var("OPENAI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(SUMMARY_TIMEOUT_SECS),
        }
    }

    /// The cloud endpoint needs a key; self-hosted endpoints may not.
    pub fn is_usable(&self) -> bool {
        self.api_key.is_some() || self.base_url.trim_end_matches('/') != DEFAULT_OPENAI_URL
    }
}

/// Summarizer backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAISummarizer {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAISummarizer {
    /// Create a new summarizer with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Initializing OpenAI summarizer: url={}, model={}",
            config.base_url, config.gen_model
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    ///
    /// Returns `Ok(None)` when no usable endpoint is configured.
    pub fn from_env() -> Result<Option<Self>> {
        let config = OpenAIConfig::from_env();
        if !config.is_usable() {
            return Ok(None);
        }
        Self::new(config).map(Some)
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(self.url(endpoint));

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }

    async fn chat(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        debug!(
            model = %self.config.gen_model,
            prompt_len = prompt.len(),
            max_tokens,
            "Requesting chat completion"
        );

        let request = ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        };

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &body));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(Error::Inference("Completion returned no content".to_string()));
        }

        debug!(response_len = content.len(), "Chat completion finished");
        Ok(content)
    }
}

#[async_trait]
impl SummarizationBackend for OpenAISummarizer {
    async fn summarize(&self, transcript: &str) -> Result<String> {
        self.chat(
            SUMMARY_SYSTEM_PROMPT,
            &summary_prompt(transcript),
            SUMMARY_MAX_TOKENS,
            0.3,
        )
        .await
    }

    async fn extract_key_topics(&self, transcript: &str) -> Result<String> {
        self.chat(
            KEY_TOPICS_SYSTEM_PROMPT,
            &key_topics_prompt(transcript),
            KEY_TOPICS_MAX_TOKENS,
            0.2,
        )
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        let mut req = self
            .client
            .get(self.url("/models"))
            .timeout(Duration::from_secs(5));
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => Ok(true),
            Ok(resp) => {
                warn!("OpenAI health check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("OpenAI health check error: {}", e);
                Ok(false)
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}
