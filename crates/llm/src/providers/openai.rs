//! OpenAI-compatible chat completions provider.
//!
//! Backs the hosted generation option. Any endpoint speaking the
//! `/chat/completions` protocol works; the base URL is configurable.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use electro_core::{AppError, AppResult, FailureKind, Secret};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<LlmUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Hosted chat-completion client.
pub struct OpenAiClient {
    base_url: String,
    api_key: Secret,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(base_url: impl Into<String>, api_key: Secret) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn to_chat_request<'a>(&self, request: &'a LlmRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        ChatRequest {
            model: &request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, "Sending chat completion request");

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(&self.to_chat_request(request))
            .send()
            .await
            .map_err(|e| super::request_error("chat completions API", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(AppError::LlmInvocation {
                kind: FailureKind::from_status(status.as_u16()),
                message: format!("Chat completions API error ({}): {}", status, detail),
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            AppError::llm_permanent(format!("Failed to parse chat completion: {}", e))
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::llm_permanent("Chat completion returned no content"))?;

        let usage = chat.usage.unwrap_or_default();
        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Received chat completion"
        );

        Ok(LlmResponse {
            content,
            model: chat.model,
            usage,
        })
    }
}
