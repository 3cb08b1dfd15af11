//! Manual content and document output
//!
//! Content writers turn the crawl and its analysis into manual sections; the
//! document writer lays those out as Markdown and hands other formats to an
//! external renderer.

mod document;
mod outline;
mod writer;

pub use document::{render_markdown, DocumentWriter, GeneratedDocuments};
pub use outline::OutlineContentWriter;
pub use writer::ProviderContentWriter;

use crate::analysis::{CrawlAnalysis, PageCategory};
use crate::crawler::CrawlOutput;
use crate::provider::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{format} renderer failed: {message}")]
    Renderer { format: String, message: String },
}

/// One manual section, describing one screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualSection {
    pub heading: String,
    pub page_url: String,
    pub category: PageCategory,
    /// Markdown body
    pub body: String,
    pub screenshots: Vec<PathBuf>,
}

/// Complete manual text, ready to be laid out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualContent {
    pub title: String,
    pub introduction: String,
    pub sections: Vec<ManualSection>,
    pub word_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl ManualContent {
    pub fn new(title: &str, introduction: String, sections: Vec<ManualSection>) -> Self {
        let word_count = word_count(title)
            + word_count(&introduction)
            + sections
                .iter()
                .map(|s| word_count(&s.heading) + word_count(&s.body))
                .sum::<usize>();

        Self {
            title: title.to_string(),
            introduction,
            sections,
            word_count,
            generated_at: Utc::now(),
        }
    }
}

/// Whitespace-separated words in `text`
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Produces manual content from a crawl
#[async_trait]
pub trait ContentWriter: Send + Sync {
    async fn write(
        &self,
        title: &str,
        crawl: &CrawlOutput,
        analysis: &CrawlAnalysis,
    ) -> Result<ManualContent, ContentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  one\ttwo\nthree  "), 3);
    }

    #[test]
    fn test_manual_word_count_covers_all_text() {
        let section = ManualSection {
            heading: "Settings".to_string(),
            page_url: "https://example.test/settings".to_string(),
            category: PageCategory::Settings,
            body: "Change your password here.".to_string(),
            screenshots: Vec::new(),
        };
        let content = ManualContent::new("User Guide", "Welcome to the app.".to_string(), vec![section]);
        assert_eq!(content.word_count, 2 + 4 + 1 + 4);
    }
}
