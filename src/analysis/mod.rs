//! Crawl analysis
//!
//! Turns the raw crawl output into the statistics and per-page judgements the
//! content stage writes from. Everything here is a pure function of the
//! [`CrawlOutput`].

mod accessibility;
mod categorize;

pub use accessibility::{
    accessibility_score, AccessibilityScore, Deduction, UNLABELED_FIELD_PENALTY,
    UNNAMED_ELEMENT_PENALTY,
};
pub use categorize::{categorize, PageCategory};

use crate::crawler::CrawlOutput;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Analysis of one crawled page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnalysis {
    pub url: String,
    pub title: String,
    pub depth: u32,
    pub category: PageCategory,
    pub element_count: usize,
    pub form_field_count: usize,
    pub screenshot_count: usize,
    pub accessibility: AccessibilityScore,
}

/// Analysis of a whole crawl
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlAnalysis {
    pub start_url: String,
    pub total_pages: usize,
    pub failed_pages: usize,
    pub total_elements: usize,
    pub total_screenshots: usize,
    /// Element counts keyed by element type
    pub elements_by_type: BTreeMap<String, usize>,
    /// Page counts keyed by category
    pub pages_by_category: BTreeMap<String, usize>,
    /// Distinct navigation labels, most confident first
    pub navigation_labels: Vec<String>,
    pub pages: Vec<PageAnalysis>,
    /// Mean of the per-page scores, 0 for an empty crawl
    pub average_accessibility: f64,
}

/// Analyzes every successfully crawled page
pub fn analyze(crawl: &CrawlOutput) -> CrawlAnalysis {
    let mut elements_by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut pages_by_category: BTreeMap<String, usize> = BTreeMap::new();

    let pages: Vec<PageAnalysis> = crawl
        .pages
        .iter()
        .map(|page| {
            for element in &page.elements {
                *elements_by_type
                    .entry(element.element_type.as_str().to_string())
                    .or_default() += 1;
            }

            let category = categorize(page);
            *pages_by_category.entry(category.as_str().to_string()).or_default() += 1;

            PageAnalysis {
                url: page.url.clone(),
                title: page.title.clone(),
                depth: page.depth,
                category,
                element_count: page.elements.len(),
                form_field_count: page
                    .elements
                    .iter()
                    .filter(|e| e.element_type.is_form_field())
                    .count(),
                screenshot_count: page.screenshots.len(),
                accessibility: accessibility_score(&page.elements),
            }
        })
        .collect();

    let average_accessibility = if pages.is_empty() {
        0.0
    } else {
        pages.iter().map(|p| p.accessibility.score as f64).sum::<f64>() / pages.len() as f64
    };

    let analysis = CrawlAnalysis {
        start_url: crawl.start_url.clone(),
        total_pages: pages.len(),
        failed_pages: crawl.failed.len(),
        total_elements: crawl.element_count(),
        total_screenshots: crawl.screenshot_count(),
        elements_by_type,
        pages_by_category,
        navigation_labels: navigation_labels(crawl),
        pages,
        average_accessibility,
    };

    tracing::info!(
        "Analyzed {} pages: {} elements, average accessibility {:.1}",
        analysis.total_pages,
        analysis.total_elements,
        analysis.average_accessibility
    );
    analysis
}

/// Navigation labels across all pages, deduplicated case-insensitively and
/// ordered by their best confidence
fn navigation_labels(crawl: &CrawlOutput) -> Vec<String> {
    let mut entries: Vec<(&str, f64)> = crawl
        .pages
        .iter()
        .flat_map(|p| p.navigation.iter())
        .map(|n| (n.text.trim(), n.confidence))
        .filter(|(text, _)| !text.is_empty())
        .collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|(text, _)| seen.insert(text.to_lowercase()))
        .map(|(text, _)| text.to_string())
        .collect()
}
