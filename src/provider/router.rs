use super::manager::{KeyManager, ProviderRole};
use super::transport::ChatMessage;
use super::ProviderError;
use crate::config::{ProviderConfig, ProvidersConfig};
use std::sync::Arc;
use tracing::{info, warn};

const NOT_CONFIGURED: &str = "not configured";

/// Sends prompts to the primary provider and falls back to the secondary one
#[derive(Clone, Default)]
pub struct FallbackRouter {
    primary: Option<Arc<KeyManager>>,
    fallback: Option<Arc<KeyManager>>,
}

impl FallbackRouter {
    pub fn new(primary: Option<Arc<KeyManager>>, fallback: Option<Arc<KeyManager>>) -> Self {
        Self { primary, fallback }
    }

    /// Builds key managers for whichever providers are configured
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        let build = |provider: &Option<ProviderConfig>, role| {
            provider
                .as_ref()
                .map(|p| KeyManager::from_config(p, config, role).map(Arc::new))
                .transpose()
        };

        Ok(Self::new(
            build(&config.primary, ProviderRole::Primary)?,
            build(&config.fallback, ProviderRole::Fallback)?,
        ))
    }

    /// Whether at least one provider is configured
    pub fn is_configured(&self) -> bool {
        self.primary.is_some() || self.fallback.is_some()
    }

    /// Sends `messages` to the primary provider, then to the fallback
    ///
    /// # Errors
    ///
    /// `AllProvidersFailed` carrying both providers' reasons when neither
    /// produced a completion
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ProviderError> {
        let primary_reason = match &self.primary {
            Some(manager) => match manager.complete(messages.clone()).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!("Primary provider {} failed: {}", manager.provider(), e);
                    e.to_string()
                }
            },
            None => NOT_CONFIGURED.to_string(),
        };

        let fallback_reason = match &self.fallback {
            Some(manager) => {
                info!("Falling back to {}", manager.provider());
                match manager.complete(messages).await {
                    Ok(text) => return Ok(text),
                    Err(e) => e.to_string(),
                }
            }
            None => NOT_CONFIGURED.to_string(),
        };

        Err(ProviderError::AllProvidersFailed {
            primary: primary_reason,
            fallback: fallback_reason,
        })
    }
}
