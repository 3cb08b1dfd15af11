//! Pipeline orchestration
//!
//! Drives the fixed Login → Crawl → Analyze → Content → Generate sequence
//! through the agent runtime. The first failing phase ends the run; the
//! execution is still finalized, reported and written to the ledger.

mod execution;
mod orchestrator;
mod report;
mod workers;

pub use execution::{PipelineExecution, PipelinePhase, PipelineStatistics};
pub use orchestrator::Pipeline;
pub use report::{render_report, write_reports, ReportPaths};
pub use workers::{AnalyzeWorker, ContentWorker, CrawlWorker, GenerateWorker, LoginWorker};

use crate::agent::AgentError;
use crate::storage::StorageError;
use thiserror::Error;

/// Sender recorded on tasks the orchestrator creates
pub const PIPELINE_SENDER: &str = "pipeline";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{phase} phase failed: {message}")]
    PhaseFailure {
        phase: PipelinePhase,
        message: String,
        /// Statistics gathered before the failure
        statistics: PipelineStatistics,
    },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Crawl of {0} produced no pages")]
    EmptyCrawl(String),

    #[error("Agent {agent} cannot handle {kind} tasks")]
    UnexpectedTask { agent: String, kind: String },

    #[error("No execution in progress")]
    NotRunning,

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Phase that failed, for phase failures
    pub fn phase(&self) -> Option<PipelinePhase> {
        match self {
            Self::PhaseFailure { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}
