//! Mock text generator for tests
//!
//! Returns a canned reply (or a fixed failure) and records every prompt it
//! receives, so tests can assert on what would have been sent upstream.

use super::traits::TextGenerator;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

/// Canned-response text generator.
///
/// # Example
///
/// ```rust
/// use pipeline_crm::copilot::{MockTextGenerator, TextGenerator};
///
/// # tokio_test::block_on(async {
/// let generator = MockTextGenerator::new("Schedule a scoping call");
/// let reply = generator.generate("system", "what next?").await.unwrap();
/// assert_eq!(reply, "Schedule a scoping call");
/// assert_eq!(generator.prompts(), vec!["what next?".to_string()]);
///
/// let broken = MockTextGenerator::failing();
/// assert!(broken.generate("system", "what next?").await.is_err());
/// # });
/// ```
#[derive(Debug)]
pub struct MockTextGenerator {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockTextGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A generator whose every call fails, as an unreachable upstream would
    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, _system: &str, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => anyhow::bail!("mock upstream unavailable"),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
