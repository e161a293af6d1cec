//! OpenAI-compatible chat completions client

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::debug;

use super::types::{ApiErrorBody, ChatRequest, ChatResponse};
use crate::config::BackendConfig;
use crate::error::{RunError, RunResult};
use crate::mediator::ModelCredentials;
use crate::tools::ToolSpec;
use crate::transcript::Message;

/// One non-streaming completion per call
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        seed: i64,
    ) -> RunResult<ChatResponse>;
}

/// Client for any backend speaking the chat completions protocol
pub struct OpenAiCompatClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatClient {
    /// Create a client for the credentials' model, routed per `config`
    pub fn new(credentials: &ModelCredentials, config: &BackendConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url =
            config.base_url_for(&credentials.model, credentials.endpoint.as_deref());
        debug!("Model {} routed to {}", credentials.model, base_url);

        Ok(Self {
            http_client,
            base_url,
            api_key: credentials.api_key.clone(),
            model: credentials.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Full URL of the completions endpoint
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> RunResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| RunError::Credential("API key is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatClient {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        seed: i64,
    ) -> RunResult<ChatResponse> {
        let request = ChatRequest::new(self.model.clone(), messages, tools, seed);
        debug!(
            "POST {} ({} messages, {} tools)",
            self.endpoint(),
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            debug!("Model backend returned {}", status);
            return Err(status_error(status, &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| RunError::model_call(format!("failed to parse API response: {e}")))
    }
}

fn request_error(err: &reqwest::Error) -> RunError {
    let message = format!("failed to send request: {err}");
    if err.is_connect() || err.is_timeout() {
        RunError::transient_model_call(message)
    } else {
        RunError::model_call(message)
    }
}

fn status_error(status: StatusCode, body: &str) -> RunError {
    let detail = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(api_error) => {
            debug!(
                "Model backend error type: {}",
                api_error.error.error_type.as_deref().unwrap_or("unknown")
            );
            api_error.error.message
        }
        Err(_) => body.to_string(),
    };
    let message = format!("API error ({status}): {detail}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        RunError::transient_model_call(message)
    } else {
        RunError::model_call(message)
    }
}
