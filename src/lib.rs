//! ManualForge: crawl a web application and turn it into a user manual
//!
//! This crate walks a web application page by page through a headless browser,
//! detects the interactive elements on every page, captures screenshots and
//! feeds the results through a fixed Login → Crawl → Analyze → Content →
//! Generate pipeline whose content stage is assisted by AI providers.

pub mod agent;
pub mod analysis;
pub mod browser;
pub mod config;
pub mod content;
pub mod crawler;
pub mod detector;
pub mod pipeline;
pub mod provider;
pub mod screenshot;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for ManualForge operations
#[derive(Debug, Error)]
pub enum ManualError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Element detection error: {0}")]
    Detection(#[from] detector::DetectionError),

    #[error("Screenshot capture error: {0}")]
    Capture(#[from] screenshot::CaptureError),

    #[error("Provider error: {0}")]
    Provider(#[from] provider::ProviderError),

    #[error("Content error: {0}")]
    Content(#[from] content::ContentError),

    #[error("Agent error: {0}")]
    Agent(#[from] agent::AgentError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Environment variable {0} is not set")]
    MissingEnv(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for ManualForge operations
pub type Result<T> = std::result::Result<T, ManualError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use pipeline::{Pipeline, PipelineExecution};
pub use url::{extract_host, is_same_host, normalize_url};
