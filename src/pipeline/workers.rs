//! The five phase workers
//!
//! Each worker handles exactly one [`TaskKind`] and hands its result back to
//! the orchestrator as a [`TaskOutput`].

use super::{PipelineError, PipelinePhase};
use crate::agent::{Task, TaskKind, TaskOutput, Worker, WorkerContext};
use crate::analysis::analyze;
use crate::browser::BrowserSession;
use crate::config::{AuthConfig, CrawlerConfig, ScreenshotConfig};
use crate::content::{ContentWriter, DocumentWriter};
use crate::crawler::CrawlEngine;
use crate::screenshot::ScreenshotCache;
use crate::storage::ObjectStore;
use crate::url::normalize_url;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

fn unexpected(agent: &str, task: &Task) -> crate::ManualError {
    PipelineError::UnexpectedTask {
        agent: agent.to_string(),
        kind: task.kind.name().to_string(),
    }
    .into()
}

/// Signs in through the application's login form
pub struct LoginWorker {
    browser: Arc<dyn BrowserSession>,
    navigation_timeout: Duration,
    selector_timeout: Duration,
    /// Pause after submitting the form
    settle: Duration,
}

impl LoginWorker {
    pub fn new(browser: Arc<dyn BrowserSession>, crawler: &CrawlerConfig) -> Self {
        Self {
            browser,
            navigation_timeout: Duration::from_millis(crawler.navigation_timeout_ms),
            selector_timeout: Duration::from_millis(crawler.selector_timeout_ms),
            settle: Duration::from_millis(crawler.page_delay_ms),
        }
    }

    async fn login(&self, auth: &AuthConfig, login_url: &str) -> Result<String, PipelineError> {
        let failed = |step: &str, e: crate::browser::BrowserError| {
            PipelineError::Authentication(format!("{}: {}", step, e))
        };

        self.browser
            .goto(login_url, self.navigation_timeout)
            .await
            .map_err(|e| failed("cannot open login page", e))?;
        self.browser
            .wait_for(&auth.username_selector, self.selector_timeout)
            .await
            .map_err(|e| failed("login form not found", e))?;
        self.browser
            .fill(&auth.username_selector, &auth.username)
            .await
            .map_err(|e| failed("cannot enter username", e))?;
        self.browser
            .fill(&auth.password_selector, &auth.password)
            .await
            .map_err(|e| failed("cannot enter password", e))?;
        self.browser
            .click(&auth.submit_selector)
            .await
            .map_err(|e| failed("cannot submit login form", e))?;

        tokio::time::sleep(self.settle).await;

        if let Some(marker) = &auth.success_selector {
            self.browser
                .wait_for(marker, self.selector_timeout)
                .await
                .map_err(|e| failed("logged-in marker never appeared", e))?;
        }

        let landed = self
            .browser
            .current_url()
            .await
            .map_err(|e| failed("cannot read landing page", e))?;

        if auth.success_selector.is_none() {
            let same_page = match (normalize_url(&landed), normalize_url(login_url)) {
                (Ok(a), Ok(b)) => a == b,
                _ => landed == login_url,
            };
            let form_still_shown = self
                .browser
                .bounding_box(&auth.password_selector)
                .await
                .map_err(|e| failed("cannot inspect landing page", e))?
                .is_some();
            if same_page && form_still_shown {
                return Err(PipelineError::Authentication(
                    "still on the login page after submitting credentials".to_string(),
                ));
            }
        }

        Ok(landed)
    }
}

#[async_trait]
impl Worker for LoginWorker {
    fn name(&self) -> &str {
        PipelinePhase::Login.agent()
    }

    async fn process_task(
        &mut self,
        task: &Task,
        _ctx: &mut WorkerContext,
    ) -> crate::Result<TaskOutput> {
        let TaskKind::Login(request) = &task.kind else {
            return Err(unexpected(self.name(), task));
        };

        info!("Logging in as {} at {}", request.auth.username, request.login_url());
        let landing_url = self.login(&request.auth, request.login_url()).await?;
        info!("Logged in, landed on {}", landing_url);
        Ok(TaskOutput::LoggedIn { landing_url })
    }
}

/// Runs the breadth-first crawl on the shared browser session
pub struct CrawlWorker {
    browser: Arc<dyn BrowserSession>,
    crawler: CrawlerConfig,
    screenshots: ScreenshotConfig,
    remote: Option<(Arc<dyn ObjectStore>, String)>,
    cache: Option<ScreenshotCache>,
}

impl CrawlWorker {
    pub fn new(
        browser: Arc<dyn BrowserSession>,
        crawler: CrawlerConfig,
        screenshots: ScreenshotConfig,
    ) -> Self {
        Self {
            browser,
            crawler,
            screenshots,
            remote: None,
            cache: None,
        }
    }

    /// Uploads new captures to `bucket`
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>, bucket: &str) -> Self {
        self.remote = Some((store, bucket.to_string()));
        self
    }
}

#[async_trait]
impl Worker for CrawlWorker {
    fn name(&self) -> &str {
        PipelinePhase::Crawl.agent()
    }

    /// Opens the screenshot cache and drops entries that are no longer usable
    async fn initialize(&mut self) -> crate::Result<()> {
        if !self.screenshots.enabled {
            debug!("Screenshots disabled, crawl runs without a cache");
            return Ok(());
        }

        let mut cache = ScreenshotCache::open(&self.screenshots)?;
        let report = cache.optimize()?;
        if report.entries_removed() > 0 {
            info!(
                "Screenshot cache: removed {} missing and {} expired entries, {} remain",
                report.missing_files, report.expired, report.remaining
            );
        }
        if let Some((store, bucket)) = &self.remote {
            cache = cache.with_object_store(store.clone(), bucket);
        }
        self.cache = Some(cache);
        Ok(())
    }

    async fn process_task(
        &mut self,
        task: &Task,
        _ctx: &mut WorkerContext,
    ) -> crate::Result<TaskOutput> {
        let TaskKind::Crawl(request) = &task.kind else {
            return Err(unexpected(self.name(), task));
        };

        let mut config = self.crawler.clone();
        config.start_url = request.start_url.clone();
        let engine = CrawlEngine::new(config, &self.screenshots)?;
        let output = engine.run(self.browser.as_ref(), self.cache.as_mut()).await;

        if output.pages.is_empty() {
            return Err(PipelineError::EmptyCrawl(request.start_url.clone()).into());
        }
        if let Some(cache) = &self.cache {
            let stats = cache.stats();
            debug!(
                "Screenshot cache: {} hits, {} misses, {} duplicates",
                stats.hits, stats.misses, stats.duplicates
            );
        }
        Ok(TaskOutput::Crawled(Arc::new(output)))
    }

    async fn cleanup(&mut self) -> crate::Result<()> {
        if let Some(cache) = &self.cache {
            cache.flush()?;
        }
        Ok(())
    }
}

/// Computes statistics, categories and accessibility scores
#[derive(Debug, Default)]
pub struct AnalyzeWorker;

#[async_trait]
impl Worker for AnalyzeWorker {
    fn name(&self) -> &str {
        PipelinePhase::Analyze.agent()
    }

    async fn process_task(
        &mut self,
        task: &Task,
        _ctx: &mut WorkerContext,
    ) -> crate::Result<TaskOutput> {
        let TaskKind::Analyze(request) = &task.kind else {
            return Err(unexpected(self.name(), task));
        };

        let analysis = analyze(&request.crawl);
        info!(
            "Analyzed {} pages ({} elements, average accessibility {:.1})",
            analysis.total_pages, analysis.total_elements, analysis.average_accessibility
        );
        Ok(TaskOutput::Analyzed(Arc::new(analysis)))
    }
}

/// Writes the manual text through a [`ContentWriter`]
pub struct ContentWorker {
    writer: Box<dyn ContentWriter>,
    title: String,
}

impl ContentWorker {
    pub fn new(writer: Box<dyn ContentWriter>, title: &str) -> Self {
        Self {
            writer,
            title: title.to_string(),
        }
    }
}

#[async_trait]
impl Worker for ContentWorker {
    fn name(&self) -> &str {
        PipelinePhase::Content.agent()
    }

    async fn process_task(
        &mut self,
        task: &Task,
        _ctx: &mut WorkerContext,
    ) -> crate::Result<TaskOutput> {
        let TaskKind::Content(request) = &task.kind else {
            return Err(unexpected(self.name(), task));
        };

        let content = self
            .writer
            .write(&self.title, &request.crawl, &request.analysis)
            .await?;
        if content.sections.is_empty() {
            warn!("Manual has no sections");
        }
        Ok(TaskOutput::Content(Arc::new(content)))
    }
}

/// Lays the manual out in the requested format
pub struct GenerateWorker {
    writer: DocumentWriter,
}

impl GenerateWorker {
    pub fn new(writer: DocumentWriter) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl Worker for GenerateWorker {
    fn name(&self) -> &str {
        PipelinePhase::Generate.agent()
    }

    async fn process_task(
        &mut self,
        task: &Task,
        _ctx: &mut WorkerContext,
    ) -> crate::Result<TaskOutput> {
        let TaskKind::Generate(request) = &task.kind else {
            return Err(unexpected(self.name(), task));
        };

        let documents = self.writer.write(&request.content, request.format).await?;
        Ok(TaskOutput::Generated(documents))
    }
}
