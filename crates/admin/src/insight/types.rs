//! Wire types for the OpenAI-compatible chat-completions API.

use serde::{Deserialize, Serialize};

/// A single prompt message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Always `"user"` for insight prompts.
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: content.into(),
        }
    }
}

/// Request body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

/// Response body (non-streaming). Only the fields we read are modeled.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if any.
    #[must_use]
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

/// One completion choice.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

/// The assistant message inside a choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error body returned by the endpoint on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Nested error details.
#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_stream_false() {
        let request = ChatCompletionRequest {
            model: "deepseek-ai/DeepSeek-V3".to_owned(),
            messages: vec![ChatMessage::user("你好")],
            stream: false,
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "你好");
    }

    #[test]
    fn response_first_content() {
        let json = r#"{
            "id": "cmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "1. 建议"}}]
        }"#;
        let response: ChatCompletionResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(response.first_content(), Some("1. 建议"));
    }

    #[test]
    fn response_without_choices_has_no_content() {
        let response: ChatCompletionResponse = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(response.first_content(), None);
    }

    #[test]
    fn api_error_deserialization() {
        let json = r#"{"error": {"message": "Insufficient balance", "code": 30001}}"#;
        let response: ApiErrorResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(response.error.message, "Insufficient balance");
    }
}
