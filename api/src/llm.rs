//! Chat-completion client for plan synthesis. The provider exposes an
//! OpenAI-compatible surface; requests pin a JSON response mode because the
//! handler feeds the content straight into the plan normalizer.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model provider returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// One-shot completion request: a system persona plus a single user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the completion content, or an empty string when the provider
    /// omits it. Content is expected, not guaranteed, to be JSON; the
    /// caller normalizes regardless.
    async fn complete_json(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Production [`ChatModel`] against Groq's chat-completions endpoint.
pub struct GroqClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GroqClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for GroqClient {
    async fn complete_json(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
            "response_format": { "type": "json_object" },
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletion = response.json().await?;
        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Scripted fake used by route tests.
#[cfg(test)]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    pub struct MockModel {
        pub responses: Mutex<VecDeque<String>>,
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl MockModel {
        /// Responses are handed out in order; once exhausted, "{}".
        pub fn scripted(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
                ..Self::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for MockModel {
        async fn complete_json(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LlmError::Api {
                    status: 500,
                    message: "model offline".to_string(),
                });
            }
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "{}".to_string()))
        }
    }
}
