//! Crawl engine - breadth-first traversal of the application
//!
//! The engine owns the frontier, the visited set and the page list for one
//! crawl. Pages are processed one at a time on a single browser session; a
//! page that fails is logged and skipped without ending the crawl.

use super::parser::discover_links;
use super::scheduler::{Frontier, FrontierEntry, Politeness};
use super::{CrawlOutput, CrawlStats, FailedPage, PageRecord, ScreenshotRef};
use crate::browser::{BrowserError, BrowserSession};
use crate::config::{CrawlerConfig, ScreenshotConfig};
use crate::detector::{detect_page, PageElements};
use crate::provider::{with_retry, Attempt, RetryPolicy};
use crate::screenshot::{CaptureRequest, ScreenshotCache};
use crate::url::{extract_host, normalize_url};
use crate::UrlError;
use chrono::Utc;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Wait before retrying a failed navigation
const NAVIGATION_BACKOFF: Duration = Duration::from_millis(500);

/// Output of processing one frontier entry
struct ProcessedPage {
    record: PageRecord,
    /// Same-host links found on the page
    links: Vec<Url>,
    /// Normalized URL the browser ended up on, when it differs from the request
    landed: Option<String>,
}

/// Breadth-first crawler over the pages of one host
pub struct CrawlEngine {
    config: CrawlerConfig,
    origin: Url,
    screenshots_per_page: usize,
    frontier: Frontier,
    politeness: Politeness,
    visited: HashSet<String>,
    visit_order: Vec<String>,
    pages: Vec<PageRecord>,
    failed: Vec<FailedPage>,
    stats: CrawlStats,
}

impl CrawlEngine {
    /// Creates an engine seeded with the configured start URL
    ///
    /// # Arguments
    ///
    /// * `config` - Traversal limits and delays
    /// * `screenshots` - Per-page capture budget; disabled captures nothing
    pub fn new(config: CrawlerConfig, screenshots: &ScreenshotConfig) -> Result<Self, UrlError> {
        let origin = normalize_url(&config.start_url)?;
        let screenshots_per_page = if screenshots.enabled {
            screenshots.max_per_page
        } else {
            0
        };

        Ok(Self {
            frontier: Frontier::seeded(origin.as_str()),
            politeness: Politeness::new(Duration::from_millis(config.page_delay_ms)),
            origin,
            screenshots_per_page,
            config,
            visited: HashSet::new(),
            visit_order: Vec::new(),
            pages: Vec::new(),
            failed: Vec::new(),
            stats: CrawlStats::default(),
        })
    }

    /// Runs the traversal to completion
    ///
    /// Pops the frontier until it is empty or `max-pages` pages have been
    /// processed. An entry deeper than `max-depth` or already visited is
    /// skipped; links are only followed from pages shallower than `max-depth`.
    pub async fn run(
        mut self,
        browser: &dyn BrowserSession,
        mut cache: Option<&mut ScreenshotCache>,
    ) -> CrawlOutput {
        let started = Instant::now();
        info!(
            "Starting crawl of {} (max depth {}, {} links per page)",
            self.origin, self.config.max_depth, self.config.max_links_per_page
        );

        while let Some(entry) = self.frontier.pop() {
            if entry.depth > self.config.max_depth || self.visited.contains(&entry.url) {
                continue;
            }

            if self.pages.len() >= self.config.max_pages {
                info!(
                    "Reached the {} page limit with {} URLs still queued",
                    self.config.max_pages,
                    self.frontier.len() + 1
                );
                break;
            }

            let host = Url::parse(&entry.url)
                .ok()
                .and_then(|url| extract_host(&url))
                .unwrap_or_default();
            self.politeness.wait(&host).await;

            match self.process_page(browser, &entry, cache.as_deref_mut()).await {
                Ok(ProcessedPage {
                    record,
                    links,
                    landed,
                }) => {
                    debug!("Processed {} at depth {}", entry.url, entry.depth);
                    self.visited.insert(entry.url.clone());
                    if let Some(landed) = landed {
                        self.visited.insert(landed);
                    }
                    self.visit_order.push(entry.url.clone());
                    self.stats.elements_found += record.elements.len();
                    self.pages.push(record);

                    if entry.depth < self.config.max_depth {
                        self.enqueue_links(&links, entry.depth + 1);
                    }
                }
                Err(e) => {
                    warn!("Skipping {}: {}", entry.url, e);
                    self.failed.push(FailedPage {
                        url: entry.url.clone(),
                        depth: entry.depth,
                        error: e.to_string(),
                    });
                }
            }

            if self.pages.len() % 10 == 0 && !self.pages.is_empty() {
                info!(
                    "Progress: {} pages crawled, {} in frontier",
                    self.pages.len(),
                    self.frontier.len()
                );
            }
        }

        self.stats.pages_visited = self.pages.len();
        self.stats.pages_failed = self.failed.len();
        self.stats.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            "Crawl completed: {} pages visited, {} failed in {:?}",
            self.stats.pages_visited,
            self.stats.pages_failed,
            started.elapsed()
        );

        CrawlOutput {
            start_url: self.origin.to_string(),
            pages: self.pages,
            visited: self.visit_order,
            failed: self.failed,
            stats: self.stats,
        }
    }

    /// Queues up to `max-links-per-page` links not seen before in this crawl
    fn enqueue_links(&mut self, links: &[Url], depth: u32) {
        let mut enqueued = 0;
        for link in links {
            if enqueued >= self.config.max_links_per_page {
                break;
            }
            if self.frontier.push(link.as_str(), depth) {
                enqueued += 1;
            }
        }
        self.stats.links_enqueued += enqueued;
        debug!(
            "Enqueued {} of {} discovered links at depth {}",
            enqueued,
            links.len(),
            depth
        );
    }

    /// Loads one page and builds its record
    async fn process_page(
        &mut self,
        browser: &dyn BrowserSession,
        entry: &FrontierEntry,
        cache: Option<&mut ScreenshotCache>,
    ) -> Result<ProcessedPage, BrowserError> {
        let load_started = Instant::now();
        self.navigate(browser, &entry.url).await?;
        let load_time_ms = load_started.elapsed().as_millis() as u64;

        let landed = browser.current_url().await?;
        let base = Url::parse(&landed).unwrap_or_else(|_| self.origin.clone());
        let landed = normalize_url(&landed)
            .ok()
            .map(|url| url.to_string())
            .filter(|url| *url != entry.url);
        if let Some(target) = &landed {
            debug!("{} redirected to {}", entry.url, target);
            self.frontier.mark_seen(target);
        }

        let title = match browser.title().await {
            Ok(title) => title,
            Err(e) => {
                warn!("Could not read title of {}: {}", entry.url, e);
                String::new()
            }
        };

        let links = match browser.page_source().await {
            Ok(source) => discover_links(&source, &base, &self.origin),
            Err(e) => {
                warn!("Could not read source of {}: {}", entry.url, e);
                Vec::new()
            }
        };

        let detected = match detect_page(browser).await {
            Ok(detected) => detected,
            Err(e) => {
                warn!("Element detection failed on {}: {}", entry.url, e);
                PageElements::default()
            }
        };

        let screenshots = match cache {
            Some(cache) if self.screenshots_per_page > 0 => {
                self.capture_page(browser, cache, &entry.url, &detected).await
            }
            _ => Vec::new(),
        };

        let record = PageRecord {
            url: entry.url.clone(),
            depth: entry.depth,
            title,
            elements: detected.elements,
            navigation: detected.navigation,
            modals: detected.modals,
            screenshots,
            load_time_ms,
            captured_at: Utc::now(),
        };

        Ok(ProcessedPage {
            record,
            links,
            landed,
        })
    }

    /// Navigates with a bounded timeout, retrying transient failures
    async fn navigate(&self, browser: &dyn BrowserSession, url: &str) -> Result<(), BrowserError> {
        let timeout = Duration::from_millis(self.config.navigation_timeout_ms);
        let policy = RetryPolicy::new(self.config.navigation_retries, NAVIGATION_BACKOFF);

        with_retry(policy, |attempt| async move {
            if attempt > 1 {
                debug!("Navigation attempt {} for {}", attempt, url);
            }
            browser.goto(url, timeout).await.map_err(|e| {
                if e.is_transient() {
                    Attempt::Backoff(e)
                } else {
                    Attempt::Abort(e)
                }
            })
        })
        .await
    }

    /// Takes the full-page capture and one capture per top-ranked element
    ///
    /// Capture failures are logged and the capture skipped.
    async fn capture_page(
        &mut self,
        browser: &dyn BrowserSession,
        cache: &mut ScreenshotCache,
        url: &str,
        detected: &PageElements,
    ) -> Vec<ScreenshotRef> {
        let viewport = browser.viewport();
        let element_delay = Duration::from_millis(self.config.element_delay_ms);
        let mut refs = Vec::new();

        let page_request = CaptureRequest::full_page(url, viewport);
        match cache.capture(browser, &page_request).await {
            Ok(outcome) => refs.push(ScreenshotRef {
                path: outcome.path,
                content_hash: outcome.content_hash,
                selector: None,
                element_id: None,
                from_cache: outcome.from_cache,
                duplicate: outcome.duplicate,
                remote_url: outcome.remote_url,
            }),
            Err(e) => warn!("Full-page capture of {} failed: {}", url, e),
        }

        let element_budget = self.screenshots_per_page.saturating_sub(1);
        for element in detected.elements.iter().take(element_budget) {
            tokio::time::sleep(element_delay).await;

            let request = CaptureRequest::element(url, &element.selector, viewport);
            match cache.capture(browser, &request).await {
                Ok(outcome) => refs.push(ScreenshotRef {
                    path: outcome.path,
                    content_hash: outcome.content_hash,
                    selector: Some(element.selector.clone()),
                    element_id: Some(element.id.clone()),
                    from_cache: outcome.from_cache,
                    duplicate: outcome.duplicate,
                    remote_url: outcome.remote_url,
                }),
                Err(e) => debug!("Skipping capture of {} on {}: {}", element.selector, url, e),
            }
        }

        self.stats.screenshots_captured += refs.len();
        self.stats.screenshots_reused += refs.iter().filter(|r| r.from_cache || r.duplicate).count();
        refs
    }
}
