//! AI provider access
//!
//! This module contains everything between a content request and an AI API:
//! - HTTP transports for the Anthropic Messages and OpenAI Chat Completions APIs
//! - Quota-aware key pools with round-robin rotation and persisted key status
//! - The fallback router trying a primary provider, then a secondary one
//! - The retry combinator shared with the crawler

mod keys;
mod manager;
mod retry;
mod router;
mod transport;

pub use keys::{credential_fingerprint, next_utc_midnight, KeyPool, KeyRecord};
pub use manager::{KeyManager, ProviderRole};
pub use retry::{with_retry, Attempt, RetryPolicy};
pub use router::FallbackRouter;
pub use transport::{
    build_transport, AnthropicTransport, ChatMessage, CompletionRequest, OpenAiTransport,
    ProviderTransport, TransportError,
};

use thiserror::Error;

/// Errors from a provider call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Quota exhausted for {provider} key {fingerprint}")]
    QuotaExhausted { provider: String, fingerprint: String },

    #[error("Credential rejected for {provider} key {fingerprint}")]
    CredentialInvalid { provider: String, fingerprint: String },

    #[error("{provider} request timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("No available key for {0}")]
    NoAvailableKey(String),

    #[error("{provider} failed after {attempts} attempts: {last}")]
    Exhausted {
        provider: String,
        attempts: u32,
        last: String,
    },

    #[error("All providers failed (primary: {primary}; fallback: {fallback})")]
    AllProvidersFailed { primary: String, fallback: String },

    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },
}
