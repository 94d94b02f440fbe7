//! HTTP client for the chat-completions endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::instrument;

use propfee_core::DashboardData;

use crate::config::InsightConfig;

use super::error::InsightError;
use super::prompt::build_prompt;
use super::types::{ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use super::{INSIGHT_DISABLED, INSIGHT_EMPTY, InsightProvider, fallback_message};

/// Longest error body excerpt carried into an error message, in characters.
const ERROR_EXCERPT_CHARS: usize = 100;

/// Chat-completions client.
///
/// Built without an HTTP client when no API key is configured; every call
/// then short-circuits to [`InsightError::Disabled`].
#[derive(Clone)]
pub struct InsightClient {
    inner: Arc<InsightClientInner>,
}

struct InsightClientInner {
    client: Option<reqwest::Client>,
    api_url: String,
    model: String,
}

impl InsightClient {
    /// Create a new insight client.
    ///
    /// # Errors
    ///
    /// Returns `InsightError::InvalidApiKey` if the key cannot be used as a
    /// header value, or `InsightError::Http` if the HTTP client cannot be built.
    pub fn new(config: &InsightConfig) -> Result<Self, InsightError> {
        let client = match &config.api_key {
            Some(api_key) => {
                let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
                    .map_err(|_| {
                        InsightError::InvalidApiKey("contains invalid header characters".to_owned())
                    })?;
                auth.set_sensitive(true);

                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(AUTHORIZATION, auth);

                Some(
                    reqwest::Client::builder()
                        .default_headers(headers)
                        .timeout(config.timeout)
                        .build()?,
                )
            }
            None => None,
        };

        Ok(Self {
            inner: Arc::new(InsightClientInner {
                client,
                api_url: config.api_url.clone(),
                model: config.model.clone(),
            }),
        })
    }

    /// Whether an API key is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.client.is_some()
    }

    /// Send one prompt and return the first completion's text.
    ///
    /// An empty string means the endpoint answered without content.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the endpoint returns an error.
    #[instrument(skip(self, prompt), fields(model = %self.inner.model))]
    pub async fn complete(&self, prompt: &str) -> Result<String, InsightError> {
        let client = self.inner.client.as_ref().ok_or(InsightError::Disabled)?;

        let request = ChatCompletionRequest {
            model: self.inner.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            stream: false,
        };

        let response = client
            .post(&self.inner.api_url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_status(status, response).await);
        }

        let body = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| InsightError::Parse(format!("Failed to parse response: {e}")))?;

        Ok(parsed.first_content().unwrap_or_default().trim().to_owned())
    }
}

/// Turn a non-success response into an error.
async fn handle_error_status(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> InsightError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return InsightError::RateLimited;
    }

    match response.text().await {
        Ok(body) => {
            let message = serde_json::from_str::<ApiErrorResponse>(&body).map_or_else(
                |_| body.chars().take(ERROR_EXCERPT_CHARS).collect(),
                |api_error| api_error.error.message,
            );
            InsightError::Api {
                status: status.as_u16(),
                message,
            }
        }
        Err(e) => InsightError::Http(e),
    }
}

#[async_trait]
impl InsightProvider for InsightClient {
    async fn summarize(&self, data: &DashboardData) -> String {
        if !self.is_enabled() {
            return INSIGHT_DISABLED.to_owned();
        }

        match self.complete(&build_prompt(data)).await {
            Ok(text) if text.is_empty() => INSIGHT_EMPTY.to_owned(),
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Insight request failed");
                fallback_message(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config(api_key: Option<&str>) -> InsightConfig {
        InsightConfig {
            api_key: api_key.map(secrecy::SecretString::from),
            api_url: "http://127.0.0.1:9/v1/chat/completions".to_owned(),
            model: "deepseek-ai/DeepSeek-V3".to_owned(),
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn disabled_client_never_calls_out() {
        let client = InsightClient::new(&config(None)).expect("client");
        assert!(!client.is_enabled());
        assert_eq!(
            client.summarize(&DashboardData::default()).await,
            INSIGHT_DISABLED
        );
        assert!(matches!(
            client.complete("hi").await,
            Err(InsightError::Disabled)
        ));
    }

    #[test]
    fn rejects_api_key_with_newline() {
        let result = InsightClient::new(&config(Some("sk-abc\ndef")));
        assert!(matches!(result, Err(InsightError::InvalidApiKey(_))));
    }

    #[test]
    fn insight_client_is_clone_send_sync() {
        fn assert_traits<T: Clone + Send + Sync>() {}
        assert_traits::<InsightClient>();
    }
}
