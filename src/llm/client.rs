use crate::error::{AgentError, AgentResult};
use crate::llm::TextModel;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str =
    "You are a precise assistant for a business database. Follow the instructions exactly.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> AgentResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::unknown(format!("Failed to build HTTP client: {}", e), None))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Render an error and all of its sources, outermost first.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[async_trait]
impl TextModel for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> AgentResult<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.1,
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "Calling language model");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let code = if e.is_timeout() { "ETIMEDOUT" } else { "LLM_REQUEST" };
                AgentError::unknown(
                    format!("Language model call failed: {}", error_chain(&e)),
                    Some(code),
                )
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let detail = response.text().await.unwrap_or_default();
            warn!(model = %self.model, "Language model rate limited");
            return Err(AgentError::rate_limited(format!(
                "Rate limited by language model: {}",
                detail.trim()
            )));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AgentError::unknown(
                format!("Language model returned {}: {}", status, detail.trim()),
                Some(status.as_str()),
            ));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            AgentError::unknown(format!("Invalid language model response: {}", e), None)
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AgentError::unknown("Language model returned an empty reply", None))
    }

    fn name(&self) -> &str {
        &self.model
    }
}
