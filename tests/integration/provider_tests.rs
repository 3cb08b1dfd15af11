//! Integration tests for provider key rotation and fallback
//!
//! These tests use wiremock to stand in for the provider APIs.

use manualforge::provider::{
    ChatMessage, FallbackRouter, KeyManager, KeyPool, OpenAiTransport, ProviderError, RetryPolicy,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": text } }]
    }))
}

/// Creates a manager for an OpenAI-compatible mock server
fn create_manager(server: &MockServer, keys: &[&str]) -> KeyManager {
    let transport =
        OpenAiTransport::new(Some(&server.uri()), Duration::from_secs(5)).expect("client builds");
    let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    KeyManager::new(
        Arc::new(transport),
        KeyPool::new("openai", &keys, 100),
        RetryPolicy::new(2, Duration::from_millis(10)),
        Duration::from_secs(5),
        "gpt-test",
    )
}

fn prompt() -> Vec<ChatMessage> {
    vec![ChatMessage::user("Describe the settings screen")]
}

#[tokio::test]
async fn test_keys_used_in_turn() {
    let server = MockServer::start().await;
    for key in ["key-a", "key-b", "key-c"] {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", format!("Bearer {}", key).as_str()))
            .respond_with(completion(key))
            .expect(2)
            .mount(&server)
            .await;
    }

    let manager = create_manager(&server, &["key-a", "key-b", "key-c"]);
    let mut replies = Vec::new();
    for _ in 0..6 {
        replies.push(manager.complete(prompt()).await.unwrap());
    }

    assert_eq!(
        replies,
        vec!["key-a", "key-b", "key-c", "key-a", "key-b", "key-c"]
    );
    assert!(manager.key_status().iter().all(|k| k.request_count == 2));
    server.verify().await;
}

#[tokio::test]
async fn test_exhausted_key_leaves_rotation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer key-a"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer key-b"))
        .respond_with(completion("from b"))
        .expect(3)
        .mount(&server)
        .await;

    let manager = create_manager(&server, &["key-a", "key-b"]);
    for _ in 0..3 {
        assert_eq!(manager.complete(prompt()).await.unwrap(), "from b");
    }

    let status = manager.key_status();
    assert!(status[0].quota_exhausted);
    assert!(status[0].is_active);
    assert_eq!(status[1].request_count, 3);
    server.verify().await;
}

#[tokio::test]
async fn test_fallback_after_rejected_credentials() {
    let primary_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&primary_server)
        .await;

    let fallback_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("fallback answer"))
        .mount(&fallback_server)
        .await;

    let primary = Arc::new(create_manager(&primary_server, &["revoked"]));
    let fallback = Arc::new(create_manager(&fallback_server, &["good"]));
    let router = FallbackRouter::new(Some(primary.clone()), Some(fallback));

    assert_eq!(router.complete(prompt()).await.unwrap(), "fallback answer");
    assert!(!primary.key_status()[0].is_active);

    // The revoked key stays out of rotation
    assert_eq!(router.complete(prompt()).await.unwrap(), "fallback answer");
    primary_server.verify().await;
}

#[tokio::test]
async fn test_both_providers_failing() {
    let primary_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&primary_server)
        .await;

    let fallback_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&fallback_server)
        .await;

    let router = FallbackRouter::new(
        Some(Arc::new(create_manager(&primary_server, &["p1"]))),
        Some(Arc::new(create_manager(&fallback_server, &["f1"]))),
    );

    let error = router.complete(prompt()).await.unwrap_err();
    match &error {
        ProviderError::AllProvidersFailed { primary, fallback } => {
            assert!(primary.contains("HTTP 500"));
            assert!(fallback.contains("No available key") || fallback.contains("quota"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}
