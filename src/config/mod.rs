//! Configuration module for ManualForge
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and layering command-line overrides on top of them.
//!
//! # Example
//!
//! ```no_run
//! use manualforge::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("manualforge.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AuthConfig, BrowserConfig, Config, CrawlerConfig, ObjectStoreConfig, OutputConfig,
    OutputFormat, Overrides, ProviderConfig, ProviderKind, ProvidersConfig, ScreenshotConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
