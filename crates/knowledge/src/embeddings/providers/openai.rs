//! Hosted embedding provider for OpenAI-compatible `/embeddings` endpoints.
//!
//! One HTTP request per batch. Retry and timeout are applied by the
//! `Embedder` around each batch; this provider only classifies failures.

use crate::embeddings::{EmbedKind, EmbeddingProvider};
use electro_core::{AppError, AppResult, Backend, FailureKind, Secret};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Hosted embedding provider.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingProvider {
    client: Client,
    base_url: String,
    api_key: Secret,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Secret,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            dimensions,
        }
    }

    fn transport_error(err: reqwest::Error) -> AppError {
        let kind = if err.is_timeout() || err.is_connect() {
            FailureKind::Transient
        } else {
            FailureKind::Permanent
        };
        AppError::embedding(kind, format!("Failed to reach embeddings API: {}", err))
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn backend(&self) -> Backend {
        Backend::Hosted
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String], _kind: EmbedKind) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(AppError::embedding(
                FailureKind::from_status(status.as_u16()),
                format!("Embeddings API error ({}): {}", status, detail),
            ));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::embedding(
                FailureKind::Permanent,
                format!("Failed to parse embeddings response: {}", e),
            )
        })?;

        // The API may return items out of order; `index` is authoritative.
        parsed.data.sort_by_key(|item| item.index);
        debug!("Received {} embeddings", parsed.data.len());

        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(uri: &str) -> OpenAiEmbeddingProvider {
        OpenAiEmbeddingProvider::new(uri, Secret::new("sk-test"), "text-embedding-3-small", 3)
    }

    #[tokio::test]
    async fn test_embed_batch_orders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": ["first", "second"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [
                    { "object": "embedding", "index": 1, "embedding": [0.0, 1.0, 0.0] },
                    { "object": "embedding", "index": 0, "embedding": [1.0, 0.0, 0.0] }
                ],
                "model": "text-embedding-3-small"
            })))
            .mount(&server)
            .await;

        let vectors = provider(&server.uri())
            .embed_batch(&["first".to_string(), "second".to_string()], EmbedKind::Passage)
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[tokio::test]
    async fn test_unauthorized_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .embed_batch(&["x".to_string()], EmbedKind::Query)
            .await
            .unwrap_err();

        assert!(!err.is_transient());
        assert!(err.to_string().contains("Incorrect API key"));
        assert!(!err.user_message().contains("Incorrect API key"));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .embed_batch(&["x".to_string()], EmbedKind::Passage)
            .await
            .unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        // Port 9 (discard) is closed on test machines.
        let err = provider("http://127.0.0.1:9")
            .embed_batch(&["x".to_string()], EmbedKind::Passage)
            .await
            .unwrap_err();

        assert!(err.is_transient());
    }
}
