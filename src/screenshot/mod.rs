//! Content-addressed screenshot cache
//!
//! Captures are looked up two ways:
//! - by request key, a hash of URL, selector and viewport, for exact repeats
//! - by content hash, the SHA-256 of the image bytes, so visually identical
//!   captures from different requests share one file
//!
//! The JSON index is rewritten after every mutation.

mod cache;

pub use cache::{CacheStats, OptimizeReport, ScreenshotCache};

use crate::browser::{BrowserError, ScreenshotOptions, Viewport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use thiserror::Error;

/// Capture failures; the crawler skips the capture and carries on
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Browser failed to capture: {0}")]
    Browser(#[from] BrowserError),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache index error: {0}")]
    Index(#[from] serde_json::Error),
}

/// What to capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub url: String,
    /// `None` captures the whole page
    pub selector: Option<String>,
    pub viewport: Viewport,
}

impl CaptureRequest {
    pub fn full_page(url: &str, viewport: Viewport) -> Self {
        Self {
            url: url.to_string(),
            selector: None,
            viewport,
        }
    }

    pub fn element(url: &str, selector: &str, viewport: Viewport) -> Self {
        Self {
            url: url.to_string(),
            selector: Some(selector.to_string()),
            viewport,
        }
    }

    /// `sha256(url | selector-or-"fullpage" | WxH)`, hex encoded
    pub fn request_key(&self) -> String {
        let target = self.selector.as_deref().unwrap_or("fullpage");
        sha256_hex(
            format!(
                "{}|{}|{}x{}",
                self.url, target, self.viewport.width, self.viewport.height
            )
            .as_bytes(),
        )
    }

    pub fn options(&self) -> ScreenshotOptions {
        match &self.selector {
            Some(selector) => ScreenshotOptions::element(selector),
            None => ScreenshotOptions::full_page(),
        }
    }
}

/// Result of a capture call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub path: PathBuf,
    pub content_hash: String,
    pub request_key: String,
    /// Served from a still-valid request-key hit without touching the browser
    pub from_cache: bool,
    /// Freshly captured, but identical to an image already stored
    pub duplicate: bool,
    pub remote_url: Option<String>,
}

/// One stored image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_hash: String,
    /// Request key that first produced this image
    pub request_key: String,
    pub storage_path: PathBuf,
    pub source_url: String,
    pub captured_at: DateTime<Utc>,
    pub ttl_secs: i64,
    #[serde(default)]
    pub remote_url: Option<String>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.captured_at).num_seconds() >= self.ttl_secs
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_key_distinguishes_inputs() {
        let viewport = Viewport::new(1280, 800);
        let page = CaptureRequest::full_page("https://example.test/", viewport);
        let element = CaptureRequest::element("https://example.test/", "#save", viewport);
        let wider = CaptureRequest::full_page("https://example.test/", Viewport::new(1920, 800));

        assert_eq!(page.request_key(), page.clone().request_key());
        assert_ne!(page.request_key(), element.request_key());
        assert_ne!(page.request_key(), wider.request_key());
        assert_eq!(page.request_key().len(), 64);
    }

    #[test]
    fn test_entry_expiry() {
        let now = Utc::now();
        let entry = CacheEntry {
            content_hash: "h".to_string(),
            request_key: "k".to_string(),
            storage_path: PathBuf::from("a.png"),
            source_url: "https://example.test/".to_string(),
            captured_at: now - chrono::Duration::seconds(30),
            ttl_secs: 60,
            remote_url: None,
        };
        assert!(!entry.is_expired(now));
        assert!(entry.is_expired(now + chrono::Duration::seconds(30)));
    }
}
