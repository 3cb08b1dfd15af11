use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Main configuration structure for ManualForge
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub screenshots: ScreenshotConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Credentials for the application under documentation; no section means no login phase
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default, rename = "object-store")]
    pub object_store: Option<ObjectStoreConfig>,
}

impl Config {
    /// Builds a configuration with every section at its default, crawling `start_url`
    pub fn for_start_url(start_url: &str) -> Self {
        Self {
            crawler: CrawlerConfig::for_start_url(start_url),
            browser: BrowserConfig::default(),
            screenshots: ScreenshotConfig::default(),
            providers: ProvidersConfig::default(),
            output: OutputConfig::default(),
            auth: None,
            object_store: None,
        }
    }

    /// Applies command-line overrides on top of file or default values
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(url) = &overrides.url {
            self.crawler.start_url = url.clone();
        }

        if let Some(username) = &overrides.login {
            let password = overrides.password.clone().unwrap_or_default();
            match self.auth.as_mut() {
                Some(auth) => {
                    auth.username = username.clone();
                    if overrides.password.is_some() {
                        auth.password = password;
                    }
                }
                None => self.auth = Some(AuthConfig::new(username, &password)),
            }
        } else if let (Some(password), Some(auth)) = (&overrides.password, self.auth.as_mut()) {
            auth.password = password.clone();
        }

        if let Some(format) = overrides.output_format {
            self.output.format = format;
        }

        if let Some(enabled) = overrides.screenshots {
            self.screenshots.enabled = enabled;
        }

        if let Some(retries) = overrides.max_retries {
            self.providers.max_retries = retries;
            self.crawler.navigation_retries = retries;
        }
    }
}

/// Values supplied on the command line that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub output_format: Option<OutputFormat>,
    pub screenshots: Option<bool>,
    pub max_retries: Option<u32>,
}

/// Crawl traversal configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// URL the breadth-first traversal is seeded with
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Maximum link depth from the start URL
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of unseen links enqueued from a single page
    #[serde(rename = "max-links-per-page", default = "default_max_links_per_page")]
    pub max_links_per_page: usize,

    /// Upper bound on pages processed in one crawl
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: usize,

    /// Fixed pause between successive page loads (milliseconds)
    #[serde(rename = "page-delay-ms", default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Fixed pause between successive element captures (milliseconds)
    #[serde(rename = "element-delay-ms", default = "default_element_delay_ms")]
    pub element_delay_ms: u64,

    #[serde(rename = "navigation-timeout-ms", default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    #[serde(rename = "selector-timeout-ms", default = "default_selector_timeout_ms")]
    pub selector_timeout_ms: u64,

    /// Navigation attempts per page before the URL is skipped
    #[serde(rename = "navigation-retries", default = "default_navigation_retries")]
    pub navigation_retries: u32,
}

impl CrawlerConfig {
    pub fn for_start_url(start_url: &str) -> Self {
        Self {
            start_url: start_url.to_string(),
            max_depth: default_max_depth(),
            max_links_per_page: default_max_links_per_page(),
            max_pages: default_max_pages(),
            page_delay_ms: default_page_delay_ms(),
            element_delay_ms: default_element_delay_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            selector_timeout_ms: default_selector_timeout_ms(),
            navigation_retries: default_navigation_retries(),
        }
    }
}

/// Headless browser configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// WebDriver endpoint (chromedriver, geckodriver or a Selenium grid)
    #[serde(rename = "webdriver-url", default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(rename = "viewport-width", default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(rename = "viewport-height", default = "default_viewport_height")]
    pub viewport_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: true,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

/// Screenshot capture and cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding captured images
    #[serde(rename = "cache-dir", default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// JSON index of cache entries
    #[serde(rename = "cache-file", default = "default_cache_file")]
    pub cache_file: PathBuf,

    /// Lifetime of a cached capture (seconds)
    #[serde(rename = "ttl-secs", default = "default_ttl_secs")]
    pub ttl_secs: i64,

    /// Captures per page, the full-page capture included
    #[serde(rename = "max-per-page", default = "default_max_per_page")]
    pub max_per_page: usize,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: default_cache_dir(),
            cache_file: default_cache_file(),
            ttl_secs: default_ttl_secs(),
            max_per_page: default_max_per_page(),
        }
    }
}

/// AI provider configuration shared by both key pools
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Attempts per provider call
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed wait after a generic provider failure (milliseconds)
    #[serde(rename = "backoff-ms", default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,

    /// Directory for the per-provider key status files
    #[serde(rename = "state-dir", default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub primary: Option<ProviderConfig>,

    #[serde(default)]
    pub fallback: Option<ProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            timeout_ms: default_provider_timeout_ms(),
            state_dir: default_state_dir(),
            primary: None,
            fallback: None,
        }
    }
}

/// A single AI provider and its credential pool
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,

    /// Overrides the provider's public API endpoint
    #[serde(rename = "base-url", default)]
    pub base_url: Option<String>,

    pub model: String,

    #[serde(default)]
    pub keys: Vec<String>,

    /// Environment variable holding additional comma-separated keys
    #[serde(rename = "keys-env", default)]
    pub keys_env: Option<String>,

    /// Requests per key per day before the key is treated as exhausted
    #[serde(rename = "daily-limit", default = "default_daily_limit")]
    pub daily_limit: u32,

    #[serde(rename = "max-tokens", default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl ProviderConfig {
    /// Returns the configured keys followed by any found in `keys-env`
    pub fn resolve_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if let Some(var) = &self.keys_env {
            match std::env::var(var) {
                Ok(value) => {
                    keys.extend(
                        value
                            .split(',')
                            .map(|k| k.trim().to_string())
                            .filter(|k| !k.is_empty()),
                    );
                }
                Err(_) => tracing::warn!("Provider key variable {} is not set", var),
            }
        }

        keys
    }
}

/// Supported AI provider APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the manual, reports and screenshots links
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default)]
    pub format: OutputFormat,

    /// Manual title; defaults to the start URL's host
    #[serde(default)]
    pub title: Option<String>,

    /// Path to the SQLite run ledger
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: PathBuf,

    /// External command turning Markdown into HTML (`{input}` and `{output}` placeholders)
    #[serde(rename = "html-command", default)]
    pub html_command: Option<String>,

    /// External command turning Markdown into PDF (`{input}` and `{output}` placeholders)
    #[serde(rename = "pdf-command", default)]
    pub pdf_command: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            format: OutputFormat::default(),
            title: None,
            database_path: default_database_path(),
            html_command: None,
            pdf_command: None,
        }
    }
}

/// Document format produced by the Generate phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
    Pdf,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "pdf" => Ok(Self::Pdf),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// Login form description for the application under documentation
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Page hosting the login form; defaults to the crawl start URL
    #[serde(rename = "login-url", default)]
    pub login_url: Option<String>,

    pub username: String,

    pub password: String,

    #[serde(rename = "username-selector", default = "default_username_selector")]
    pub username_selector: String,

    #[serde(rename = "password-selector", default = "default_password_selector")]
    pub password_selector: String,

    #[serde(rename = "submit-selector", default = "default_submit_selector")]
    pub submit_selector: String,

    /// Element only present once logged in
    #[serde(rename = "success-selector", default)]
    pub success_selector: Option<String>,
}

impl AuthConfig {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            login_url: None,
            username: username.to_string(),
            password: password.to_string(),
            username_selector: default_username_selector(),
            password_selector: default_password_selector(),
            submit_selector: default_submit_selector(),
            success_selector: None,
        }
    }
}

/// Object storage endpoint for uploading screenshots and documents
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    pub endpoint: String,

    pub bucket: String,

    #[serde(rename = "timeout-ms", default = "default_object_store_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_links_per_page() -> usize {
    3
}

fn default_max_pages() -> usize {
    50
}

fn default_page_delay_ms() -> u64 {
    1000
}

fn default_element_delay_ms() -> u64 {
    500
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_selector_timeout_ms() -> u64 {
    5_000
}

fn default_navigation_retries() -> u32 {
    2
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_viewport_width() -> u32 {
    1920
}

fn default_viewport_height() -> u32 {
    1080
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./screenshots")
}

fn default_cache_file() -> PathBuf {
    PathBuf::from("./screenshots/cache.json")
}

fn default_ttl_secs() -> i64 {
    3600
}

fn default_max_per_page() -> usize {
    5
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_provider_timeout_ms() -> u64 {
    30_000
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./state")
}

fn default_daily_limit() -> u32 {
    1000
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.3
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./output/manualforge.db")
}

fn default_username_selector() -> String {
    "input[type='email'], input[name='username'], input[name='email'], input[type='text']"
        .to_string()
}

fn default_password_selector() -> String {
    "input[type='password']".to_string()
}

fn default_submit_selector() -> String {
    "button[type='submit'], input[type='submit']".to_string()
}

fn default_object_store_timeout_ms() -> u64 {
    10_000
}
