//! TextGenerator trait definition
//!
//! Same shape as `CrmStore`: async trait + Send + Sync so it can be shared
//! as `Arc<dyn TextGenerator>`.

use anyhow::Result;
use async_trait::async_trait;

/// Abstract interface for single-turn text generation.
///
/// # Implementations
///
/// - [`HttpTextGenerator`](super::HttpTextGenerator): client for any
///   OpenAI-compatible `/chat/completions` endpoint
/// - [`MockTextGenerator`](super::MockTextGenerator): canned responses for tests
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt` under the given system message.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;

    /// The model name, for logging
    fn model_name(&self) -> &str;
}
