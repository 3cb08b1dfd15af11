//! HTML parsing for link discovery
//!
//! Page source comes from the live browser session, so links are resolved
//! against the URL the browser actually ended up on.

use crate::url::{is_same_host, normalize_url};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Links whose path contains one of these would end the logged-in session
const SESSION_ENDING_PATHS: &[&str] = &["logout", "log-out", "signout", "sign-out", "sign_out"];

/// Extensions of downloads rather than application screens
const NON_DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "zip", "gz", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "csv", "xls", "xlsx",
    "doc", "docx", "mp3", "mp4", "avi", "mov", "dmg", "exe",
];

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Absolute links in document order, duplicates included
    pub links: Vec<Url>,
}

/// Parses HTML and extracts the title and every followable link
///
/// # Link Extraction Rules
///
/// **Include:** `<a href>` anywhere in the document
///
/// **Exclude:**
/// - `<a href download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - fragment-only links (same-page anchors)
/// - non-HTTP(S) URLs after resolution
///
/// # Example
///
/// ```
/// use manualforge::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.test/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].as_str(), "https://example.test/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

/// Same-host, normalized, de-duplicated links worth crawling, in document order
///
/// # Arguments
///
/// * `html` - Page source
/// * `base_url` - URL the page was served from, for resolving relative links
/// * `origin` - Start URL of the crawl; links to other hosts are dropped
pub fn discover_links(html: &str, base_url: &Url, origin: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();

    parse_html(html, base_url)
        .links
        .into_iter()
        .filter(|link| is_same_host(link, origin))
        .filter(|link| is_crawlable(link))
        .filter_map(|link| normalize_url(link.as_str()).ok())
        .filter(|link| seen.insert(link.to_string()))
        .collect()
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&a_selector)
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

/// Resolves a link href to an absolute HTTP(S) URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    matches!(absolute_url.scheme(), "http" | "https").then_some(absolute_url)
}

/// Rejects downloads and links that would log the crawler out
fn is_crawlable(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();

    if path
        .split('/')
        .any(|segment| SESSION_ENDING_PATHS.contains(&segment))
    {
        return false;
    }

    match path.rsplit('/').next().and_then(|last| last.rsplit_once('.')) {
        Some((_, extension)) => !NON_DOCUMENT_EXTENSIONS.contains(&extension),
        None => true,
    }
}
