//! HTTP text generator
//!
//! Implements `TextGenerator` against any OpenAI-compatible
//! `POST {base_url}/chat/completions` endpoint (OpenAI, Azure-compatible
//! gateways, LiteLLM, Ollama, vLLM...).

use super::traits::TextGenerator;
use crate::CopilotConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat-completions client. Cheaply cloneable.
#[derive(Clone)]
pub struct HttpTextGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible error response
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl HttpTextGenerator {
    /// Create a generator for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        base_url: &str,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            api_key,
        })
    }

    /// Build from config. Returns `None` when the copilot is disabled.
    pub fn from_config(config: &CopilotConfig) -> Result<Option<Self>> {
        let base_url = match config.enabled_base_url() {
            Some(url) => url,
            None => return Ok(None),
        };
        let generator = Self::new(
            base_url,
            config.model.clone(),
            config.api_key.clone().filter(|k| !k.is_empty()),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Some(generator))
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let mut req = self.client.post(&self.url).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req
            .send()
            .await
            .with_context(|| format!("Failed to reach completion API at {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<ErrorResponse>(&body) {
                if let Some(detail) = err.error {
                    anyhow::bail!(
                        "Completion API error ({}): {}",
                        status.as_u16(),
                        detail.message
                    );
                }
            }
            anyhow::bail!("Completion API returned {}: {}", status.as_u16(), body);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion API response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .context("Completion API returned no content")
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
