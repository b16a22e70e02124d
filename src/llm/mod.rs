//! Text-generation model access.
//!
//! The pipeline only needs prompt-in, text-out. `TextModel` is that seam;
//! `ChatCompletionsClient` implements it against an OpenAI-compatible API.

mod client;

pub use client::ChatCompletionsClient;

use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;

#[async_trait]
pub trait TextModel: Send + Sync {
    /// Send one prompt and return the model's reply text.
    async fn generate(&self, prompt: &str) -> AgentResult<String>;

    /// Model identifier for logs and health output.
    fn name(&self) -> &str;

    /// False when the model cannot be called at all (e.g. no credentials).
    fn is_configured(&self) -> bool {
        true
    }
}

/// Stand-in used when no API key is configured. Every call fails.
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredModel;

#[async_trait]
impl TextModel for UnconfiguredModel {
    async fn generate(&self, _prompt: &str) -> AgentResult<String> {
        Err(AgentError::unknown(
            "No language model API key configured",
            Some("LLM_NOT_CONFIGURED"),
        ))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_model_fails() {
        let model = UnconfiguredModel;
        let err = model.generate("hello").await.unwrap_err();
        assert_eq!(err.code(), Some("LLM_NOT_CONFIGURED"));
        assert!(!model.is_configured());
    }
}
