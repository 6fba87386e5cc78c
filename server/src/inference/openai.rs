//! OpenAI-compatible chat completion backend
//!
//! Works against any endpoint that speaks `POST {base_url}/chat/completions`
//! (Groq, OpenAI, Ollama, vLLM). One request per turn, no retries.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::backend::{InferenceBackend, InferenceError, InferenceRequest};
use crate::config::InferenceConfig;

/// Longest error body echoed into an `InferenceError`
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: std::borrow::Cow<'a, str>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
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

pub struct OpenAiCompatibleBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    temperature: Option<f32>,
}

impl OpenAiCompatibleBackend {
    pub fn new(config: &InferenceConfig) -> Result<Self, InferenceError> {
        if config.base_url.is_empty() {
            return Err(InferenceError::NotConfigured(
                "INFERENCE_BASE_URL is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            "OpenAI-compatible backend created"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: config.timeout,
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// System prompt, then prior turns, then the new user input
    fn build_messages<'a>(request: &InferenceRequest<'a>) -> Vec<ChatMessage<'a>> {
        let mut messages = Vec::with_capacity(request.prior_turns.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: request.instructions.system_prompt().into(),
        });
        for turn in request.prior_turns {
            messages.push(ChatMessage {
                role: turn.role.as_str(),
                content: turn.content.as_str().into(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.input.into(),
        });
        messages
    }

    fn map_transport_error(&self, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout(self.timeout)
        } else {
            InferenceError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl InferenceBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &'static str {
        "openai_compatible"
    }

    async fn invoke(&self, request: InferenceRequest<'_>) -> Result<String, InferenceError> {
        let start = Instant::now();
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: Self::build_messages(&request),
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let response = req.send().await.map_err(|e| self.map_transport_error(e))?;
        let status = response.status();

        if !status.is_success() {
            let mut text = response.text().await.unwrap_or_default();
            if text.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            warn!(status = status.as_u16(), model = %self.model, "Inference API error");
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout(self.timeout)
            } else {
                InferenceError::InvalidResponse(e.to_string())
            }
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| InferenceError::InvalidResponse("no text in choices".to_string()))?;

        debug!(
            model = %self.model,
            prior_turns = request.prior_turns.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Chat completion succeeded"
        );

        Ok(text)
    }
}
