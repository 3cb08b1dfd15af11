use super::keys::{credential_fingerprint, KeyPool, KeyRecord};
use super::retry::{with_retry, Attempt, RetryPolicy};
use super::transport::{build_transport, ChatMessage, CompletionRequest, ProviderTransport, TransportError};
use super::ProviderError;
use crate::config::{ProviderConfig, ProvidersConfig};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Position of a key manager behind the fallback router
///
/// Each role keeps its own key status file, so a primary and a fallback of
/// the same provider kind never overwrite each other's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderRole {
    Primary,
    Fallback,
}

impl ProviderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

/// Model settings applied to prompts sent through [`KeyManager::complete`]
#[derive(Debug, Clone)]
struct ModelSettings {
    model: String,
    max_tokens: u32,
    temperature: f32,
}

/// Calls one provider, rotating through its key pool
///
/// The pool sits behind a `std::sync::Mutex` so a manager can be shared
/// between workers; the lock is never held across an await.
pub struct KeyManager {
    transport: Arc<dyn ProviderTransport>,
    pool: Mutex<KeyPool>,
    policy: RetryPolicy,
    timeout: Duration,
    settings: ModelSettings,
}

impl KeyManager {
    pub fn new(
        transport: Arc<dyn ProviderTransport>,
        pool: KeyPool,
        policy: RetryPolicy,
        timeout: Duration,
        model: &str,
    ) -> Self {
        Self {
            transport,
            pool: Mutex::new(pool),
            policy,
            timeout,
            settings: ModelSettings {
                model: model.to_string(),
                max_tokens: 1024,
                temperature: 0.3,
            },
        }
    }

    /// Builds a manager for a configured provider
    ///
    /// Key status is kept in `{state-dir}/{role}-{kind}-keys.json`.
    pub fn from_config(
        provider: &ProviderConfig,
        shared: &ProvidersConfig,
        role: ProviderRole,
    ) -> Result<Self, ProviderError> {
        let timeout = Duration::from_millis(shared.timeout_ms);
        let transport = build_transport(provider, timeout).map_err(|e| ProviderError::Request {
            provider: provider.kind.to_string(),
            message: e.to_string(),
        })?;

        let state_path = shared.state_dir.join(format!(
            "{}-{}-keys.json",
            role.as_str(),
            provider.kind.as_str()
        ));
        let pool = KeyPool::load(
            provider.kind.as_str(),
            &provider.resolve_keys(),
            provider.daily_limit,
            &state_path,
        );
        if pool.is_empty() {
            warn!("No keys configured for {}", provider.kind);
        }

        let policy = RetryPolicy::new(shared.max_retries, Duration::from_millis(shared.backoff_ms));
        let mut manager = Self::new(transport, pool, policy, timeout, &provider.model);
        manager.settings.max_tokens = provider.max_tokens;
        manager.settings.temperature = provider.temperature;
        Ok(manager)
    }

    pub fn provider(&self) -> &str {
        self.transport.name()
    }

    /// Next usable key, advancing the rotation
    pub fn next_available(&self) -> Option<(usize, String)> {
        self.pool().next_available(Utc::now())
    }

    /// Copy of every key's current status
    pub fn key_status(&self) -> Vec<KeyRecord> {
        self.pool().records().to_vec()
    }

    /// Sends `messages` with this provider's model settings
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ProviderError> {
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        self.call(&request).await
    }

    /// Sends `request`, rotating keys between attempts
    ///
    /// # Attempt outcomes
    ///
    /// | Outcome | Key | Next attempt |
    /// |---------|-----|--------------|
    /// | no usable key | - | none, fails with `NoAvailableKey` |
    /// | HTTP 429 | marked exhausted | immediate |
    /// | HTTP 401/403 | deactivated | immediate |
    /// | timeout / other | unchanged | after the fixed backoff |
    pub async fn call(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let provider = self.provider().to_string();

        let result = with_retry(self.policy, |attempt| {
            let provider = provider.clone();
            async move {
                let Some((index, credential)) = self.next_available() else {
                    return Err(Attempt::Abort(ProviderError::NoAvailableKey(provider)));
                };
                let fingerprint = credential_fingerprint(&credential);
                debug!(
                    "{} attempt {} with key {}",
                    provider, attempt, fingerprint
                );

                let outcome =
                    tokio::time::timeout(self.timeout, self.transport.send(&credential, request))
                        .await
                        .unwrap_or(Err(TransportError::Timeout));

                match outcome {
                    Ok(text) => {
                        self.pool().record_success(index, Utc::now());
                        self.persist();
                        Ok(text)
                    }
                    Err(TransportError::QuotaExceeded) => {
                        self.pool().mark_exhausted(index);
                        self.persist();
                        Err(Attempt::Retry(ProviderError::QuotaExhausted {
                            provider,
                            fingerprint,
                        }))
                    }
                    Err(TransportError::InvalidCredential) => {
                        self.pool().deactivate(index);
                        self.persist();
                        Err(Attempt::Retry(ProviderError::CredentialInvalid {
                            provider,
                            fingerprint,
                        }))
                    }
                    Err(TransportError::Timeout) => Err(Attempt::Backoff(ProviderError::Timeout {
                        provider,
                        timeout_ms: self.timeout.as_millis() as u64,
                    })),
                    Err(TransportError::Other(message)) => {
                        Err(Attempt::Backoff(ProviderError::Request { provider, message }))
                    }
                }
            }
        })
        .await;

        result.map_err(|e| match e {
            ProviderError::NoAvailableKey(_) => e,
            last => {
                warn!("{} call failed: {}", provider, last);
                ProviderError::Exhausted {
                    provider: provider.clone(),
                    attempts: self.policy.max_attempts,
                    last: last.to_string(),
                }
            }
        })
    }

    fn pool(&self) -> MutexGuard<'_, KeyPool> {
        self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self) {
        if let Err(e) = self.pool().persist() {
            warn!("Failed to save key state for {}: {}", self.provider(), e);
        }
    }
}
