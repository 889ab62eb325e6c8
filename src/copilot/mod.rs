//! AI sales copilot
//!
//! Turns an opportunity snapshot into a prompt and asks an external LLM for
//! a summary, next step, email draft or value hypothesis. Read-only: the
//! copilot never writes to the store.
//!
//! - `TextGenerator` trait: single-turn completion interface
//! - `HttpTextGenerator`: OpenAI-compatible chat-completions client
//! - `MockTextGenerator`: canned replies for tests

pub mod mock;
pub mod prompt;
pub mod provider;
pub mod traits;

pub use mock::MockTextGenerator;
pub use prompt::{build_context, render_prompt, CopilotAction, OpportunitySnapshot};
pub use provider::HttpTextGenerator;
pub use traits::TextGenerator;

use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CopilotError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("AI service temporarily unavailable")]
    Unavailable,
}

/// Copilot front door. Holds no generator when the copilot is disabled.
#[derive(Clone)]
pub struct CopilotService {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl CopilotService {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    pub fn disabled() -> Self {
        Self { generator: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    /// Run `action` over `snapshot`. Upstream and configuration failures are
    /// logged and collapsed into [`CopilotError::Unavailable`].
    pub async fn generate(
        &self,
        action: CopilotAction,
        snapshot: &OpportunitySnapshot,
    ) -> Result<String, CopilotError> {
        let generator = match &self.generator {
            Some(g) => g,
            None => {
                tracing::warn!(%action, "Copilot request while copilot is disabled");
                return Err(CopilotError::Unavailable);
            }
        };

        let user_prompt = render_prompt(action, &build_context(snapshot));
        generator
            .generate(prompt::SYSTEM_PROMPT, &user_prompt)
            .await
            .map_err(|e| {
                tracing::error!(
                    %action,
                    model = generator.model_name(),
                    opp_id = %snapshot.opportunity.opp_id,
                    "Copilot generation failed: {:#}",
                    e
                );
                CopilotError::Unavailable
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_opportunity;

    fn snapshot() -> OpportunitySnapshot {
        OpportunitySnapshot {
            opportunity: test_opportunity("opp_1", "org_1", "u1", "stage_discovery", 10.0, 50),
            organization: None,
            contact: None,
            activity_count: 0,
            extra_context: Some("Board meets Friday".into()),
        }
    }

    #[tokio::test]
    async fn test_generate_passes_rendered_prompt() {
        let mock = Arc::new(MockTextGenerator::new("Short summary."));
        let generator: Arc<dyn TextGenerator> = mock.clone();
        let service = CopilotService::new(Some(generator));

        let text = service
            .generate(CopilotAction::Summarize, &snapshot())
            .await
            .unwrap();
        assert_eq!(text, "Short summary.");

        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Additional Context: Board meets Friday"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_unavailable() {
        let service = CopilotService::new(Some(Arc::new(MockTextGenerator::failing())));
        let err = service
            .generate(CopilotAction::DraftEmail, &snapshot())
            .await
            .unwrap_err();
        assert!(matches!(err, CopilotError::Unavailable));
        assert_eq!(err.to_string(), "AI service temporarily unavailable");
    }

    #[tokio::test]
    async fn test_disabled_is_unavailable() {
        let service = CopilotService::disabled();
        assert!(!service.is_enabled());
        assert!(matches!(
            service
                .generate(CopilotAction::Summarize, &snapshot())
                .await,
            Err(CopilotError::Unavailable)
        ));
    }
}
