use crate::config::types::{
    AuthConfig, BrowserConfig, Config, CrawlerConfig, ObjectStoreConfig, ProviderConfig,
    ProvidersConfig, ScreenshotConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_browser_config(&config.browser)?;
    validate_screenshot_config(&config.screenshots)?;
    validate_providers_config(&config.providers)?;
    if let Some(auth) = &config.auth {
        validate_auth_config(auth)?;
    }
    if let Some(store) = &config.object_store {
        validate_object_store_config(store)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_http_url("start-url", &config.start_url)?;

    if config.max_links_per_page < 1 {
        return Err(ConfigError::Validation(format!(
            "max-links-per-page must be >= 1, got {}",
            config.max_links_per_page
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.navigation_timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "navigation-timeout-ms must be >= 1000ms, got {}ms",
            config.navigation_timeout_ms
        )));
    }

    if config.navigation_retries < 1 {
        return Err(ConfigError::Validation(
            "navigation-retries must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    validate_http_url("webdriver-url", &config.webdriver_url)?;

    if config.viewport_width == 0 || config.viewport_height == 0 {
        return Err(ConfigError::Validation(format!(
            "viewport must be non-zero, got {}x{}",
            config.viewport_width, config.viewport_height
        )));
    }

    Ok(())
}

fn validate_screenshot_config(config: &ScreenshotConfig) -> Result<(), ConfigError> {
    if config.ttl_secs <= 0 {
        return Err(ConfigError::Validation(format!(
            "screenshot ttl-secs must be positive, got {}",
            config.ttl_secs
        )));
    }

    if config.enabled && config.max_per_page < 1 {
        return Err(ConfigError::Validation(
            "screenshot max-per-page must be >= 1 when screenshots are enabled".to_string(),
        ));
    }

    Ok(())
}

fn validate_providers_config(config: &ProvidersConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "providers max-retries must be >= 1".to_string(),
        ));
    }

    for provider in [&config.primary, &config.fallback].into_iter().flatten() {
        validate_provider_config(provider)?;
    }

    Ok(())
}

fn validate_provider_config(config: &ProviderConfig) -> Result<(), ConfigError> {
    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "{} provider model cannot be empty",
            config.kind
        )));
    }

    if config.daily_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "{} provider daily-limit must be >= 1",
            config.kind
        )));
    }

    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(ConfigError::Validation(format!(
            "{} provider temperature must be within 0.0..=2.0, got {}",
            config.kind, config.temperature
        )));
    }

    if let Some(base_url) = &config.base_url {
        validate_http_url("base-url", base_url)?;
    }

    Ok(())
}

fn validate_auth_config(config: &AuthConfig) -> Result<(), ConfigError> {
    if config.username.is_empty() {
        return Err(ConfigError::Validation(
            "auth username cannot be empty".to_string(),
        ));
    }

    if config.password.is_empty() {
        return Err(ConfigError::Validation(
            "auth password cannot be empty".to_string(),
        ));
    }

    if let Some(login_url) = &config.login_url {
        validate_http_url("login-url", login_url)?;
    }

    Ok(())
}

fn validate_object_store_config(config: &ObjectStoreConfig) -> Result<(), ConfigError> {
    validate_http_url("object-store endpoint", &config.endpoint)?;

    if config.bucket.is_empty() {
        return Err(ConfigError::Validation(
            "object-store bucket cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use HTTP or HTTPS",
            field, value
        )));
    }

    Ok(())
}
