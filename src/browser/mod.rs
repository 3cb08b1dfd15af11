//! Headless browser boundary
//!
//! The crawler, login phase and screenshot cache only ever talk to the
//! [`BrowserSession`] trait. A single session (one page/tab) is reused for every
//! navigation so cookies and DOM state survive from login through the crawl.
//!
//! - [`WebDriverSession`] drives a real browser through a WebDriver endpoint
//! - [`FixtureBrowser`] serves canned pages from memory for tests and offline runs
//! - [`snapshot`] gathers the DOM facts the element detector works on

mod fixture;
pub mod snapshot;
mod webdriver;

pub use fixture::{FixtureBrowser, FixturePage};
pub use snapshot::{take_snapshot, DomNode, DomSnapshot, NodeGroup, SnapshotQuery};
pub use webdriver::WebDriverSession;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a browser session
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("No element matches selector '{0}'")]
    ElementNotFound(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Browser session is closed")]
    Closed,

    #[error("WebDriver error: {0}")]
    Driver(String),
}

impl BrowserError {
    /// Returns true for failures worth another navigation attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Navigation { .. } | Self::Driver(_))
    }
}

/// Browser viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// Element bounding box in document coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// What a screenshot should cover
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScreenshotOptions {
    /// Clip the capture to the first element matching this selector
    pub selector: Option<String>,
    pub full_page: bool,
}

impl ScreenshotOptions {
    pub fn full_page() -> Self {
        Self {
            selector: None,
            full_page: true,
        }
    }

    pub fn element(selector: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            full_page: false,
        }
    }
}

/// A live browser page
///
/// Every method is bounded: implementations return [`BrowserError::Timeout`]
/// rather than hang. Methods take `&self` so one session can be shared by the
/// login and crawl workers behind an `Arc`.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigates the page and waits for the load to finish
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// URL currently displayed, after any redirects
    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn title(&self) -> Result<String, BrowserError>;

    /// Serialized DOM of the current page
    async fn page_source(&self) -> Result<String, BrowserError>;

    /// Evaluates a script body in the page; `arguments[i]` maps to `args[i]`
    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError>;

    /// Captures PNG bytes of the page or of a single element
    async fn screenshot(&self, options: &ScreenshotOptions) -> Result<Vec<u8>, BrowserError>;

    async fn scroll_into_view(&self, selector: &str) -> Result<(), BrowserError>;

    /// Bounding box of the first match, `None` when nothing matches
    async fn bounding_box(&self, selector: &str) -> Result<Option<Rect>, BrowserError>;

    /// Waits until `selector` matches at least one element
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Replaces the value of the first matching input
    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    fn viewport(&self) -> Viewport;

    /// Ends the session; further calls fail with [`BrowserError::Closed`]
    async fn close(&self) -> Result<(), BrowserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_empty() {
        assert!(Rect::new(0.0, 0.0, 0.0, 10.0).is_empty());
        assert!(!Rect::new(0.0, 0.0, 1.0, 1.0).is_empty());
    }

    #[test]
    fn test_transient_errors() {
        assert!(BrowserError::Timeout {
            what: "navigation".to_string(),
            timeout_ms: 10
        }
        .is_transient());
        assert!(!BrowserError::Closed.is_transient());
        assert!(!BrowserError::ElementNotFound("#x".to_string()).is_transient());
    }
}
