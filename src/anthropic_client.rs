use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::ClientConfig;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Completion backend shared by both pipeline stages.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the messages as one request and return the concatenated text reply.
    async fn complete(&self, messages: &[ApiMessage]) -> Result<String, ModelError>;

    fn model_id(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiRole {
    User,
}

/// A message as the Messages API expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiMessage {
    pub role: ApiRole,
    pub content: ApiContent,
}

impl ApiMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ApiRole::User,
            content: ApiContent::Text(text.into()),
        }
    }

    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: ApiRole::User,
            content: ApiContent::Blocks(blocks),
        }
    }
}

/// Plain string content, or a list of typed blocks for multimodal requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApiContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn base64_image(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        ContentBlock::Image {
            source: ImageSource::Base64 {
                media_type: media_type.into(),
                data: data.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [ApiMessage],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Failure talking to the model service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    /// Connection failures and timeouts
    Network,
    /// 429
    RateLimit,
    /// 5xx
    ServerError,
    /// 401, 403
    Auth,
    /// Other 4xx
    InvalidRequest,
    /// The response could not be understood
    InvalidResponse,
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Network, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::InvalidResponse, message)
    }
}

/// Map a failed HTTP status and its body to a [`ModelError`].
pub fn classify_error(status: StatusCode, body: &str) -> ModelError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    let (kind, label) = match status.as_u16() {
        401 | 403 => (ModelErrorKind::Auth, "Authentication failed"),
        429 => (ModelErrorKind::RateLimit, "Rate limited"),
        500..=599 => (ModelErrorKind::ServerError, "Server error"),
        _ => (ModelErrorKind::InvalidRequest, "API request failed"),
    };

    ModelError::new(kind, format!("{} ({}): {}", label, status.as_u16(), detail))
}

/// One-line description of a request for debug logs, without the image payloads.
fn summarize(messages: &[ApiMessage]) -> String {
    messages
        .iter()
        .map(|message| match &message.content {
            ApiContent::Text(text) => format!("{:?}: {} chars", message.role, text.len()),
            ApiContent::Blocks(blocks) => {
                let parts: Vec<String> = blocks
                    .iter()
                    .map(|block| match block {
                        ContentBlock::Text { text } => format!("text {} chars", text.len()),
                        ContentBlock::Image {
                            source: ImageSource::Base64 { media_type, data },
                        } => format!("image {} ({} base64 chars)", media_type, data.len()),
                    })
                    .collect();
                format!("{:?}: [{}]", message.role, parts.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct AnthropicClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    endpoint: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key: config.api_key,
            model: config.model,
            max_tokens: config.max_tokens,
            endpoint: format!("{}/v1/messages", config.base_url),
            client,
        })
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn complete(&self, messages: &[ApiMessage]) -> Result<String, ModelError> {
        let request_body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages,
        };

        debug!("Sending request to Anthropic API ({}): {}", self.model, summarize(messages));

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| ModelError::network(format!("Request to Anthropic API failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API request failed with status {}: {}", status, error_text);
            return Err(classify_error(status, &error_text));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ModelError::invalid_response(format!("Malformed API response: {}", e)))?;

        debug!(
            "Received response from Anthropic API: {} blocks, stop_reason={:?}",
            body.content.len(),
            body.stop_reason
        );

        extract_text(body)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn extract_text(body: MessagesResponse) -> Result<String, ModelError> {
    let text: String = body
        .content
        .into_iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(text),
            ResponseBlock::Other => None,
        })
        .collect();

    if text.is_empty() {
        return Err(ModelError::invalid_response("Model returned no text content"));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn text_message_serializes_as_plain_string() {
        let message = ApiMessage::user_text("hello");
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "role": "user", "content": "hello" })
        );
    }

    #[test]
    fn multimodal_message_serializes_as_blocks() {
        let message = ApiMessage::user_blocks(vec![
            ContentBlock::text("What do you see in this image?"),
            ContentBlock::base64_image("image/png", "aGVsbG8="),
        ]);
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": "What do you see in this image?" },
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/png",
                            "data": "aGVsbG8="
                        }
                    }
                ]
            })
        );
    }

    #[test]
    fn request_body_shape() {
        let messages = vec![ApiMessage::user_text("hi")];
        let request = MessagesRequest {
            model: "claude-test",
            max_tokens: 4096,
            messages: &messages,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "claude-test",
                "max_tokens": 4096,
                "messages": [{ "role": "user", "content": "hi" }]
            })
        );
    }

    #[test]
    fn response_text_blocks_are_joined_and_others_skipped() {
        let body: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                { "type": "text", "text": "A cat " },
                { "type": "thinking", "thinking": "hmm" },
                { "type": "text", "text": "on a mat." }
            ],
            "stop_reason": "end_turn"
        }))
        .unwrap();
        assert_eq!(extract_text(body).unwrap(), "A cat on a mat.");
    }

    #[test]
    fn empty_response_is_an_error() {
        let body: MessagesResponse = serde_json::from_value(json!({ "content": [] })).unwrap();
        let err = extract_text(body).unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::InvalidResponse);
    }

    #[test]
    fn classify_error_reads_api_message() {
        let body = json!({
            "type": "error",
            "error": { "type": "authentication_error", "message": "invalid x-api-key" }
        })
        .to_string();
        let err = classify_error(StatusCode::UNAUTHORIZED, &body);
        assert_eq!(err.kind, ModelErrorKind::Auth);
        assert_eq!(err.to_string(), "Authentication failed (401): invalid x-api-key");
    }

    #[test]
    fn classify_error_by_status() {
        assert_eq!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, "slow down").kind,
            ModelErrorKind::RateLimit
        );
        assert_eq!(
            classify_error(StatusCode::from_u16(529).unwrap(), "overloaded").kind,
            ModelErrorKind::ServerError
        );
        let err = classify_error(StatusCode::BAD_REQUEST, "  not json  ");
        assert_eq!(err.kind, ModelErrorKind::InvalidRequest);
        assert_eq!(err.message, "API request failed (400): not json");
    }

    #[test]
    fn summary_elides_image_data() {
        let summary = summarize(&[ApiMessage::user_blocks(vec![
            ContentBlock::text("abc"),
            ContentBlock::base64_image("image/jpeg", "QUJD"),
        ])]);
        assert_eq!(summary, "User: [text 3 chars, image image/jpeg (4 base64 chars)]");
        assert!(!summary.contains("QUJD"));
    }
}
