//! Crawl traversal
//!
//! This module contains the breadth-first traversal of the application:
//! - Frontier management and politeness delays
//! - Link discovery from the live page source
//! - Per-page processing (element detection, screenshots)

mod engine;
mod parser;
mod scheduler;

pub use engine::CrawlEngine;
pub use parser::{discover_links, parse_html, ParsedPage};
pub use scheduler::{Frontier, FrontierEntry, Politeness};

use crate::detector::{InteractiveElement, ModalCandidate, NavigationElement};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A screenshot attached to a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRef {
    pub path: PathBuf,
    pub content_hash: String,
    /// Element selector, `None` for the full-page capture
    pub selector: Option<String>,
    /// Id of the element this capture shows
    pub element_id: Option<String>,
    pub from_cache: bool,
    pub duplicate: bool,
    pub remote_url: Option<String>,
}

/// Everything captured from one successfully loaded page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub depth: u32,
    pub title: String,
    pub elements: Vec<InteractiveElement>,
    pub navigation: Vec<NavigationElement>,
    pub modals: Vec<ModalCandidate>,
    pub screenshots: Vec<ScreenshotRef>,
    pub load_time_ms: u64,
    pub captured_at: DateTime<Utc>,
}

/// A URL that could not be processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPage {
    pub url: String,
    pub depth: u32,
    pub error: String,
}

/// Counters for one crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub pages_visited: usize,
    pub pages_failed: usize,
    pub elements_found: usize,
    pub links_enqueued: usize,
    /// Screenshots attached to pages, reused ones included
    pub screenshots_captured: usize,
    /// Screenshots served from the cache or deduplicated
    pub screenshots_reused: usize,
    pub duration_ms: u64,
}

/// Result of a complete crawl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlOutput {
    pub start_url: String,
    pub pages: Vec<PageRecord>,
    /// Successfully processed URLs in visit order
    pub visited: Vec<String>,
    pub failed: Vec<FailedPage>,
    pub stats: CrawlStats,
}

impl CrawlOutput {
    pub fn element_count(&self) -> usize {
        self.pages.iter().map(|p| p.elements.len()).sum()
    }

    pub fn screenshot_count(&self) -> usize {
        self.pages.iter().map(|p| p.screenshots.len()).sum()
    }
}
