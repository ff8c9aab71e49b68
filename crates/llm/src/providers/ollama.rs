//! Local generation through an Ollama runtime (`POST /api/generate`).

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use electro_core::{AppError, AppResult, FailureKind};
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    options: GenerateOptions,
    stream: bool,
}

/// Sampling parameters; Ollama ignores the top-level equivalents.
#[derive(Debug, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl<'a> From<&'a LlmRequest> for GenerateRequest<'a> {
    fn from(request: &'a LlmRequest) -> Self {
        Self {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    model: String,
    response: String,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

impl From<GenerateResponse> for LlmResponse {
    fn from(response: GenerateResponse) -> Self {
        Self {
            content: response.response,
            model: response.model,
            usage: LlmUsage::new(response.prompt_eval_count, response.eval_count),
        }
    }
}

/// Client for an Ollama server.
pub struct OllamaClient {
    endpoint: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// `endpoint` is the server root, e.g. `http://localhost:11434`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip_all, fields(model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&GenerateRequest::from(request))
            .send()
            .await
            .map_err(|e| super::request_error("Ollama", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LlmInvocation {
                kind: FailureKind::from_status(status.as_u16()),
                message: format!("Ollama returned {}: {}", status, body.trim()),
            });
        }

        let generated: GenerateResponse = response.json().await.map_err(|e| {
            AppError::llm_permanent(format!("Unreadable Ollama response: {}", e))
        })?;

        tracing::debug!(
            prompt_tokens = generated.prompt_eval_count,
            completion_tokens = generated.eval_count,
            "Ollama generation finished"
        );

        Ok(generated.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_answering(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_sampling_goes_in_options() {
        let request = LlmRequest::new("Hello", "llama3.2")
            .with_temperature(0.0)
            .with_max_tokens(200);

        let body = serde_json::to_value(GenerateRequest::from(&request)).unwrap();

        assert_eq!(body["options"]["temperature"], 0.0);
        assert_eq!(body["options"]["num_predict"], 200);
        assert!(body.get("temperature").is_none());
        assert!(body.get("system").is_none());
        assert_eq!(body["stream"], false);
    }

    #[tokio::test]
    async fn test_complete_parses_generate_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3.2",
                "stream": false,
                "system": "Answer from context"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3.2",
                "response": "The tolerance is 5%.",
                "done": true,
                "prompt_eval_count": 120,
                "eval_count": 8
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(format!("{}/", server.uri()));
        let request = LlmRequest::new("What is the tolerance?", "llama3.2")
            .with_system("Answer from context");
        let response = client.complete(&request).await.unwrap();

        assert_eq!(response.content, "The tolerance is 5%.");
        assert_eq!(response.usage.total_tokens, 128);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = server_answering(503, "loading model").await;

        let err = OllamaClient::new(server.uri())
            .complete(&LlmRequest::new("hi", "llama3.2"))
            .await
            .unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_model_is_permanent() {
        let server = server_answering(404, "model 'nope' not found").await;

        let err = OllamaClient::new(server.uri())
            .complete(&LlmRequest::new("hi", "nope"))
            .await
            .unwrap_err();

        assert!(!err.is_transient());
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let err = OllamaClient::new("http://127.0.0.1:9")
            .complete(&LlmRequest::new("hi", "llama3.2"))
            .await
            .unwrap_err();

        assert!(err.is_transient());
    }
}
