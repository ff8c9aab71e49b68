//! Timeout and retry decorator for any `LlmClient`.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use electro_core::{AppError, AppResult, RetryPolicy};
use std::sync::Arc;

/// Wraps a client so each completion is bounded by the policy timeout and
/// transient failures are retried with exponential backoff.
pub struct RetryingClient {
    inner: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait::async_trait]
impl LlmClient for RetryingClient {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let operation = format!("{} completion", self.inner.provider_name());
        self.policy
            .run(&operation, AppError::llm_transient, || self.inner.complete(request))
            .await
    }
}
