//! HTTP transports for the supported AI APIs
//!
//! A transport sends one completion request with one credential and
//! classifies the response. It never retries; rotation and retry live in the
//! key manager.

use crate::config::{ProviderConfig, ProviderKind};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Provider-neutral completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// How a single provider request failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("rate limit or quota exceeded")]
    QuotaExceeded,

    #[error("credential rejected")]
    InvalidCredential,

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

/// Sends a completion request to one provider API
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Provider name used in logs, errors and state file names
    fn name(&self) -> &str;

    /// Sends `request` authenticated with `credential`
    ///
    /// # Returns
    ///
    /// The generated text on success
    async fn send(
        &self,
        credential: &str,
        request: &CompletionRequest,
    ) -> Result<String, TransportError>;
}

/// Builds the transport for a configured provider
pub fn build_transport(
    config: &ProviderConfig,
    timeout: Duration,
) -> Result<Arc<dyn ProviderTransport>, reqwest::Error> {
    let client = build_client(timeout)?;
    let base_url = config.base_url.as_deref();

    Ok(match config.kind {
        ProviderKind::Anthropic => Arc::new(AnthropicTransport::with_client(client, base_url)),
        ProviderKind::OpenAi => Arc::new(OpenAiTransport::with_client(client, base_url)),
    })
}

fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("manualforge/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a non-success status to a transport error
fn classify_status(status: StatusCode, body: &str) -> TransportError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => TransportError::QuotaExceeded,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::InvalidCredential,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => TransportError::Timeout,
        _ => {
            let snippet: String = body.chars().take(200).collect();
            TransportError::Other(format!("HTTP {}: {}", status.as_u16(), snippet.trim()))
        }
    }
}

fn classify_reqwest(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Other(error.to_string())
    }
}

/// Posts `body` and returns the parsed JSON of a successful response
async fn post_json(
    request: reqwest::RequestBuilder,
    body: &Value,
) -> Result<Value, TransportError> {
    let response = request.json(body).send().await.map_err(classify_reqwest)?;
    let status = response.status();
    let text = response.text().await.map_err(classify_reqwest)?;

    if !status.is_success() {
        return Err(classify_status(status, &text));
    }

    serde_json::from_str(&text)
        .map_err(|e| TransportError::Other(format!("malformed response body: {}", e)))
}

/// Anthropic Messages API
pub struct AnthropicTransport {
    client: Client,
    base_url: String,
}

impl AnthropicTransport {
    pub fn new(base_url: Option<&str>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_client(timeout)?, base_url))
    }

    fn with_client(client: Client, base_url: Option<&str>) -> Self {
        Self {
            client,
            base_url: base_url
                .unwrap_or(ANTHROPIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// System messages go in the top-level `system` field, the rest in `messages`
    fn body(request: &CompletionRequest) -> Value {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();
        let messages: Vec<&ChatMessage> = request
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .collect();

        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = Value::String(system.join("\n\n"));
        }
        body
    }
}

#[async_trait]
impl ProviderTransport for AnthropicTransport {
    fn name(&self) -> &str {
        ProviderKind::Anthropic.as_str()
    }

    async fn send(
        &self,
        credential: &str,
        request: &CompletionRequest,
    ) -> Result<String, TransportError> {
        let builder = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", credential)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let response = post_json(builder, &Self::body(request)).await?;

        let text: String = response["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|block| block["type"] == "text")
                    .filter_map(|block| block["text"].as_str())
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(TransportError::Other("response has no text content".to_string()));
        }
        Ok(text)
    }
}

/// OpenAI Chat Completions API
pub struct OpenAiTransport {
    client: Client,
    base_url: String,
}

impl OpenAiTransport {
    pub fn new(base_url: Option<&str>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_client(timeout)?, base_url))
    }

    fn with_client(client: Client, base_url: Option<&str>) -> Self {
        Self {
            client,
            base_url: base_url
                .unwrap_or(OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

#[async_trait]
impl ProviderTransport for OpenAiTransport {
    fn name(&self) -> &str {
        ProviderKind::OpenAi.as_str()
    }

    async fn send(
        &self,
        credential: &str,
        request: &CompletionRequest,
    ) -> Result<String, TransportError> {
        let builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(credential);
        let body = json!({
            "model": request.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        let response = post_json(builder, &body).await?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .ok_or_else(|| TransportError::Other("response has no message content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "test-model".to_string(),
            messages: vec![
                ChatMessage::system("You write user manuals."),
                ChatMessage::user("Describe the settings page."),
            ],
            max_tokens: 128,
            temperature: 0.2,
        }
    }

    #[test]
    fn test_anthropic_body_lifts_system_prompt() {
        let body = AnthropicTransport::body(&request());
        assert_eq!(body["system"], "You write user manuals.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 128);
    }

    #[tokio::test]
    async fn test_anthropic_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "key-1"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "The settings page "}, {"type": "text", "text": "lists options."}]
            })))
            .mount(&server)
            .await;

        let transport = AnthropicTransport::new(Some(&server.uri()), Duration::from_secs(5)).unwrap();
        let text = transport.send("key-1", &request()).await.unwrap();
        assert_eq!(text, "The settings page lists options.");
    }

    #[tokio::test]
    async fn test_openai_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer key-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Open the menu."}}]
            })))
            .mount(&server)
            .await;

        let transport = OpenAiTransport::new(Some(&server.uri()), Duration::from_secs(5)).unwrap();
        assert_eq!(transport.send("key-2", &request()).await.unwrap(), "Open the menu.");
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "limited"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "revoked"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream failure"))
            .mount(&server)
            .await;

        let transport = AnthropicTransport::new(Some(&server.uri()), Duration::from_secs(5)).unwrap();
        assert_eq!(
            transport.send("limited", &request()).await,
            Err(TransportError::QuotaExceeded)
        );
        assert_eq!(
            transport.send("revoked", &request()).await,
            Err(TransportError::InvalidCredential)
        );
        assert_eq!(
            transport.send("broken", &request()).await,
            Err(TransportError::Other("HTTP 500: upstream failure".to_string()))
        );
    }

    #[tokio::test]
    async fn test_slow_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let transport = OpenAiTransport::new(Some(&server.uri()), Duration::from_millis(50)).unwrap();
        assert_eq!(
            transport.send("key", &request()).await,
            Err(TransportError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_empty_content_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
            .mount(&server)
            .await;

        let transport = AnthropicTransport::new(Some(&server.uri()), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            transport.send("key", &request()).await,
            Err(TransportError::Other(_))
        ));
    }
}
