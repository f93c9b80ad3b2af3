use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

use super::models::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ResponseFormat,
    truncate_error_body,
};
use super::prompt::{SYSTEM_PROMPT, build_classification_prompt};
use super::{LlmClient, LlmError};

/// Client for any OpenAI-compatible `chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
    request_timeout: Duration,
}

impl OpenAiClient {
    /// # Errors
    /// Fails when the base URL does not parse or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("failed to build llm http client")?;

        // `Url::join` drops the last segment unless the base ends with a slash
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized).context("invalid llm base URL")?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            model: model.into(),
            request_timeout,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, path: &str) -> Result<Url, LlmError> {
        self.base_url
            .join(path)
            .map_err(|e| LlmError::Transport(format!("failed to build llm URL: {e}")))
    }
}

fn map_send_error(error: &reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Transport(error.to_string())
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn classify(&self, text: &str) -> Result<String, LlmError> {
        let url = self.endpoint("chat/completions")?;
        let prompt = build_classification_prompt(text);
        let request = ChatCompletionRequest {
            model: &self.model,
            temperature: 0.0,
            response_format: ResponseFormat::json_object(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "sending classification request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(model = %self.model, "llm provider returned 429");
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Transport(format!(
                "llm endpoint returned error status {status}: {}",
                truncate_error_body(&body)
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Transport(format!("failed to decode llm response: {e}"))
            }
        })?;

        Ok(completion.into_content())
    }

    async fn health_check(&self) -> Result<()> {
        let url = self
            .base_url
            .join("models")
            .context("failed to build llm health URL")?;

        self.client
            .get(url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("llm health request failed")?
            .error_for_status()
            .context("llm health endpoint returned error status")?;

        Ok(())
    }
}
