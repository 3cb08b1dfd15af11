//! Pipeline orchestrator
//!
//! Owns the agent runtime, the shared browser session and the run ledger.
//! A run walks the phases in order, feeding each phase the previous phase's
//! output, and stops at the first failed [`TaskResult`](crate::agent::TaskResult).

use super::execution::{PipelineExecution, PipelinePhase};
use super::report::write_reports;
use super::workers::{AnalyzeWorker, ContentWorker, CrawlWorker, GenerateWorker, LoginWorker};
use super::{PipelineError, PIPELINE_SENDER};
use crate::agent::{
    AgentRuntime, AnalyzeRequest, ContentRequest, CrawlRequest, GenerateRequest, LoginRequest,
    Task, TaskKind, TaskOutcome, TaskOutput,
};
use crate::browser::BrowserSession;
use crate::config::Config;
use crate::content::{ContentWriter, DocumentWriter, OutlineContentWriter, ProviderContentWriter};
use crate::crawler::CrawlOutput;
use crate::provider::FallbackRouter;
use crate::storage::{open_storage, ExecutionStatus, HttpObjectStore, ObjectStore, SqliteStorage, Storage};
use crate::url::{extract_host, normalize_url};
use std::sync::Arc;
use tracing::{error, info, warn};

/// State of the run in progress
struct ActiveRun {
    execution: PipelineExecution,
    crawl: Option<Arc<CrawlOutput>>,
    /// History entries recorded before this run started
    history_start: usize,
}

/// The Login → Crawl → Analyze → Content → Generate pipeline
pub struct Pipeline {
    config: Config,
    config_hash: String,
    runtime: AgentRuntime,
    browser: Arc<dyn BrowserSession>,
    storage: SqliteStorage,
    initialized: bool,
    active: Option<ActiveRun>,
    last_execution: Option<PipelineExecution>,
}

impl Pipeline {
    /// Builds the pipeline and registers one worker per phase
    ///
    /// The login worker is only registered when the configuration has an
    /// auth section. Content is written by the AI providers when at least one
    /// is configured, and outlined from the detected elements otherwise.
    pub fn new(
        config: Config,
        config_hash: &str,
        browser: Arc<dyn BrowserSession>,
    ) -> crate::Result<Self> {
        let storage = open_storage(&config.output.database_path)?;
        let remote = object_store(&config);

        let mut runtime = AgentRuntime::new();

        if config.auth.is_some() {
            runtime.register(Box::new(LoginWorker::new(browser.clone(), &config.crawler)));
        }

        let mut crawl = CrawlWorker::new(
            browser.clone(),
            config.crawler.clone(),
            config.screenshots.clone(),
        );
        if let Some((store, bucket)) = &remote {
            crawl = crawl.with_object_store(store.clone(), bucket);
        }
        runtime.register(Box::new(crawl));

        runtime.register(Box::new(AnalyzeWorker));

        let router = FallbackRouter::from_config(&config.providers)?;
        let writer: Box<dyn ContentWriter> = if router.is_configured() {
            Box::new(ProviderContentWriter::new(router))
        } else {
            info!("No AI provider configured, writing an outline manual");
            Box::new(OutlineContentWriter)
        };
        runtime.register(Box::new(ContentWorker::new(writer, &manual_title(&config))));

        let mut documents = DocumentWriter::new(&config.output);
        if let Some((store, bucket)) = &remote {
            documents = documents.with_object_store(store.clone(), bucket);
        }
        runtime.register(Box::new(GenerateWorker::new(documents)));

        Ok(Self {
            config,
            config_hash: config_hash.to_string(),
            runtime,
            browser,
            storage,
            initialized: false,
            active: None,
            last_execution: None,
        })
    }

    /// Initializes every worker; runs at most once
    pub async fn initialize(&mut self) -> Result<(), PipelineError> {
        if !self.initialized {
            self.runtime.initialize_all().await?;
            self.initialized = true;
        }
        Ok(())
    }

    /// Runs every phase and returns the finalized execution
    ///
    /// # Errors
    ///
    /// The first phase failure, after the execution has been finalized,
    /// reported and recorded; see [`Pipeline::last_execution`] for the
    /// partial execution.
    pub async fn run(&mut self) -> Result<PipelineExecution, PipelineError> {
        self.initialize().await?;

        let execution = PipelineExecution::start(&self.config.crawler.start_url, &self.config_hash);
        info!(
            "Starting execution {} for {}",
            execution.execution_id, execution.start_url
        );
        self.storage.save_execution(&execution.to_record())?;
        self.active = Some(ActiveRun {
            execution,
            crawl: None,
            history_start: self.runtime.history().len(),
        });

        let outcome = self.run_phases().await;

        let mut run = self.active.take().ok_or(PipelineError::NotRunning)?;
        run.execution.finish(match outcome {
            Ok(()) => ExecutionStatus::Completed,
            Err(_) => ExecutionStatus::Failed,
        });
        let persisted = self.persist(&run);
        self.last_execution = Some(run.execution.clone());

        match outcome {
            Ok(()) => {
                persisted?;
                let stats = &run.execution.statistics;
                info!(
                    "Execution {} completed: {} pages, {} elements, {} screenshots, {} words",
                    run.execution.execution_id,
                    stats.pages_processed,
                    stats.elements_analyzed,
                    stats.screenshots_captured,
                    stats.word_count
                );
                Ok(run.execution)
            }
            Err(e) => {
                error!("Execution {} failed: {}", run.execution.execution_id, e);
                if let Err(pe) = persisted {
                    warn!("Could not record failed execution: {}", pe);
                }
                Err(e)
            }
        }
    }

    async fn run_phases(&mut self) -> Result<(), PipelineError> {
        let Self {
            config,
            runtime,
            active,
            ..
        } = self;
        let run = active.as_mut().ok_or(PipelineError::NotRunning)?;
        let execution = &mut run.execution;

        if let Some(auth) = &config.auth {
            let kind = TaskKind::Login(LoginRequest {
                auth: auth.clone(),
                start_url: config.crawler.start_url.clone(),
            });
            match dispatch_phase(runtime, execution, PipelinePhase::Login, kind).await? {
                TaskOutput::LoggedIn { .. } => {}
                other => return Err(unexpected_output(execution, PipelinePhase::Login, &other)),
            }
        }

        let kind = TaskKind::Crawl(CrawlRequest {
            start_url: config.crawler.start_url.clone(),
        });
        let crawl = match dispatch_phase(runtime, execution, PipelinePhase::Crawl, kind).await? {
            TaskOutput::Crawled(crawl) => crawl,
            other => return Err(unexpected_output(execution, PipelinePhase::Crawl, &other)),
        };
        execution.statistics.record_crawl(&crawl);
        run.crawl = Some(crawl.clone());

        let kind = TaskKind::Analyze(AnalyzeRequest {
            crawl: crawl.clone(),
        });
        let analysis = match dispatch_phase(runtime, execution, PipelinePhase::Analyze, kind).await? {
            TaskOutput::Analyzed(analysis) => analysis,
            other => return Err(unexpected_output(execution, PipelinePhase::Analyze, &other)),
        };

        let kind = TaskKind::Content(ContentRequest { crawl, analysis });
        let content = match dispatch_phase(runtime, execution, PipelinePhase::Content, kind).await? {
            TaskOutput::Content(content) => content,
            other => return Err(unexpected_output(execution, PipelinePhase::Content, &other)),
        };
        execution.statistics.word_count = content.word_count;

        let kind = TaskKind::Generate(GenerateRequest {
            content,
            format: config.output.format,
        });
        match dispatch_phase(runtime, execution, PipelinePhase::Generate, kind).await? {
            TaskOutput::Generated(documents) => {
                execution.document_paths = documents.paths();
            }
            other => return Err(unexpected_output(execution, PipelinePhase::Generate, &other)),
        }

        Ok(())
    }

    /// Writes the reports and the ledger rows for a finished run
    fn persist(&mut self, run: &ActiveRun) -> Result<(), PipelineError> {
        let reports = write_reports(&run.execution, &self.config.output.dir.join("reports"))?;
        info!("Execution report written to {}", reports.markdown.display());

        let execution_id = &run.execution.execution_id;
        self.storage.save_execution(&run.execution.to_record())?;
        if let Some(crawl) = &run.crawl {
            self.storage.record_pages(execution_id, &crawl.pages)?;
        }
        let entries = self
            .runtime
            .history()
            .entries()
            .get(run.history_start..)
            .unwrap_or_default();
        self.storage.record_task_history(execution_id, entries)?;
        Ok(())
    }

    /// The most recently finished execution, successful or not
    pub fn last_execution(&self) -> Option<&PipelineExecution> {
        self.last_execution.as_ref()
    }

    pub fn runtime(&self) -> &AgentRuntime {
        &self.runtime
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Best-effort teardown, also used when the run is interrupted
    ///
    /// A run still in progress is finalized as interrupted and recorded.
    /// Workers are cleaned up (flushing the screenshot cache) and the browser
    /// is closed; failures are logged.
    pub async fn shutdown(&mut self) {
        if let Some(mut run) = self.active.take() {
            warn!(
                "Execution {} interrupted",
                run.execution.execution_id
            );
            run.execution.errors.push("execution interrupted".to_string());
            run.execution.finish(ExecutionStatus::Interrupted);
            if let Err(e) = self.persist(&run) {
                warn!("Could not record interrupted execution: {}", e);
            }
            self.last_execution = Some(run.execution);
        }

        self.runtime.cleanup_all().await;
        if let Err(e) = self.browser.close().await {
            warn!("Closing the browser failed: {}", e);
        }
        info!("Shutdown complete");
    }
}

/// Sends one phase's task through the runtime and unwraps its result
async fn dispatch_phase(
    runtime: &mut AgentRuntime,
    execution: &mut PipelineExecution,
    phase: PipelinePhase,
    kind: TaskKind,
) -> Result<TaskOutput, PipelineError> {
    info!("Phase {} starting", phase);
    let task = Task::new(kind, PIPELINE_SENDER);

    let result = match runtime.dispatch(phase.agent(), task).await {
        Ok(result) => result,
        Err(e) => return Err(execution.fail_phase(phase, e.to_string())),
    };
    execution.phase_reports.push(result.report.clone());

    match result.outcome {
        TaskOutcome::Data(output) => {
            execution.complete_phase(phase);
            info!(
                "Phase {} completed in {} ms: {}",
                phase,
                result.processing_time_ms,
                output.summary()
            );
            Ok(output)
        }
        TaskOutcome::Error(message) => Err(execution.fail_phase(phase, message)),
    }
}

fn unexpected_output(
    execution: &mut PipelineExecution,
    phase: PipelinePhase,
    output: &TaskOutput,
) -> PipelineError {
    execution.fail_phase(phase, format!("unexpected output ({})", output.summary()))
}

fn object_store(config: &Config) -> Option<(Arc<dyn ObjectStore>, String)> {
    let settings = config.object_store.as_ref()?;
    match HttpObjectStore::new(settings) {
        Ok(store) => Some((Arc::new(store) as Arc<dyn ObjectStore>, settings.bucket.clone())),
        Err(e) => {
            warn!("Object storage disabled, keeping files local only: {}", e);
            None
        }
    }
}

/// Configured title, or one derived from the start URL's host
fn manual_title(config: &Config) -> String {
    if let Some(title) = &config.output.title {
        return title.clone();
    }
    normalize_url(&config.crawler.start_url)
        .ok()
        .and_then(|url| extract_host(&url))
        .map(|host| format!("{} User Manual", host))
        .unwrap_or_else(|| "User Manual".to_string())
}
