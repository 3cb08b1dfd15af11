use super::{ContentError, ContentWriter, ManualContent, ManualSection};
use crate::analysis::{CrawlAnalysis, PageAnalysis};
use crate::crawler::{CrawlOutput, PageRecord};
use async_trait::async_trait;
use std::path::PathBuf;

/// Elements listed per section
const ELEMENTS_PER_SECTION: usize = 12;

/// Builds the manual directly from the detected elements, without a provider
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineContentWriter;

#[async_trait]
impl ContentWriter for OutlineContentWriter {
    async fn write(
        &self,
        title: &str,
        crawl: &CrawlOutput,
        analysis: &CrawlAnalysis,
    ) -> Result<ManualContent, ContentError> {
        let sections = crawl
            .pages
            .iter()
            .zip(&analysis.pages)
            .map(|(page, page_analysis)| ManualSection {
                heading: section_heading(page),
                page_url: page.url.clone(),
                category: page_analysis.category,
                body: outline_body(page, page_analysis),
                screenshots: screenshot_paths(page),
            })
            .collect();

        Ok(ManualContent::new(title, introduction(analysis), sections))
    }
}

pub(crate) fn section_heading(page: &PageRecord) -> String {
    let title = page.title.trim();
    if title.is_empty() {
        page.url.clone()
    } else {
        title.to_string()
    }
}

/// Full-page capture first, then element captures
pub(crate) fn screenshot_paths(page: &PageRecord) -> Vec<PathBuf> {
    let mut refs: Vec<_> = page.screenshots.iter().collect();
    refs.sort_by_key(|s| s.selector.is_some());
    let mut paths: Vec<PathBuf> = Vec::new();
    for shot in refs {
        if !paths.contains(&shot.path) {
            paths.push(shot.path.clone());
        }
    }
    paths
}

pub(crate) fn introduction(analysis: &CrawlAnalysis) -> String {
    let mut text = format!(
        "This manual covers {} screens of {}, with {} interactive elements in total.",
        analysis.total_pages, analysis.start_url, analysis.total_elements
    );
    if !analysis.navigation_labels.is_empty() {
        let labels: Vec<&str> = analysis
            .navigation_labels
            .iter()
            .take(10)
            .map(String::as_str)
            .collect();
        text.push_str(&format!(
            "\n\nThe main navigation offers: {}.",
            labels.join(", ")
        ));
    }
    text
}

fn outline_body(page: &PageRecord, analysis: &PageAnalysis) -> String {
    let mut body = format!(
        "This is a {} screen with {} interactive elements.\n",
        analysis.category,
        page.elements.len()
    );

    if !page.elements.is_empty() {
        body.push_str("\n**Controls**\n\n");
        for element in page.elements.iter().take(ELEMENTS_PER_SECTION) {
            body.push_str(&format!(
                "- **{}** ({}): {}\n",
                element.text, element.element_type, element.functionality
            ));
        }
        if page.elements.len() > ELEMENTS_PER_SECTION {
            body.push_str(&format!(
                "- and {} more\n",
                page.elements.len() - ELEMENTS_PER_SECTION
            ));
        }
    }

    if !page.modals.is_empty() {
        body.push_str(&format!(
            "\nThis screen can show {} dialog(s) on top of the page.\n",
            page.modals.len()
        ));
    }

    body
}
