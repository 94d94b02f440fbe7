//! Error types for the insight client.
//!
//! These never reach HTTP callers: [`super::InsightProvider::summarize`]
//! turns every failure into one of the fallback messages.

use thiserror::Error;

/// Errors that can occur when requesting an insight.
#[derive(Debug, Error)]
pub enum InsightError {
    /// No API key configured.
    #[error("insight API key not configured")]
    Disabled,

    /// The API key cannot be sent as a header value.
    #[error("invalid API key: {0}")]
    InvalidApiKey(String),

    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Rate limited or out of quota (HTTP 429).
    #[error("请求失败 (429): rate limited")]
    RateLimited,

    /// Non-success status with the endpoint's error message.
    #[error("请求失败 ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the body (truncated).
        message: String,
    },

    /// Failed to parse the response body.
    #[error("parse error: {0}")]
    Parse(String),
}

impl InsightError {
    /// Whether the failure means the quota is exhausted.
    ///
    /// Some gateways report quota errors with a different status but keep
    /// `429` in the message, so the text is checked too.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited) || self.to_string().contains("429")
    }
}
