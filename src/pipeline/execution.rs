use super::PipelineError;
use crate::crawler::CrawlOutput;
use crate::storage::{ExecutionRecord, ExecutionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// One stage of the pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelinePhase {
    Login,
    Crawl,
    Analyze,
    Content,
    Generate,
}

impl PipelinePhase {
    pub const ALL: [PipelinePhase; 5] = [
        Self::Login,
        Self::Crawl,
        Self::Analyze,
        Self::Content,
        Self::Generate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Crawl => "crawl",
            Self::Analyze => "analyze",
            Self::Content => "content",
            Self::Generate => "generate",
        }
    }

    /// Name of the agent registered for this phase
    pub fn agent(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters aggregated across phases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatistics {
    pub pages_processed: usize,
    pub elements_analyzed: usize,
    pub screenshots_captured: usize,
    pub word_count: usize,
}

impl PipelineStatistics {
    pub fn record_crawl(&mut self, crawl: &CrawlOutput) {
        self.pages_processed = crawl.pages.len();
        self.elements_analyzed = crawl.element_count();
        self.screenshots_captured = crawl.screenshot_count();
    }
}

/// Record of one pipeline run
///
/// Created when the run starts, updated as phases complete and finalized
/// exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineExecution {
    pub execution_id: String,
    pub start_url: String,
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub phases_completed: Vec<PipelinePhase>,
    pub statistics: PipelineStatistics,
    pub document_paths: Vec<PathBuf>,
    /// Worker reports in phase order
    pub phase_reports: Vec<String>,
    pub errors: Vec<String>,
    pub status: ExecutionStatus,
}

impl PipelineExecution {
    pub fn start(start_url: &str, config_hash: &str) -> Self {
        Self {
            execution_id: Uuid::new_v4().to_string(),
            start_url: start_url.to_string(),
            config_hash: config_hash.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            phases_completed: Vec::new(),
            statistics: PipelineStatistics::default(),
            document_paths: Vec::new(),
            phase_reports: Vec::new(),
            errors: Vec::new(),
            status: ExecutionStatus::Running,
        }
    }

    pub fn complete_phase(&mut self, phase: PipelinePhase) {
        if !self.phases_completed.contains(&phase) {
            self.phases_completed.push(phase);
        }
    }

    /// Records `message` against `phase` and builds the matching error
    pub fn fail_phase(&mut self, phase: PipelinePhase, message: impl Into<String>) -> PipelineError {
        let message = message.into();
        self.errors.push(format!("{} phase failed: {}", phase, message));
        PipelineError::PhaseFailure {
            phase,
            message,
            statistics: self.statistics,
        }
    }

    /// Sets the final status and end time; later calls are ignored
    pub fn finish(&mut self, status: ExecutionStatus) {
        if self.ended_at.is_some() {
            return;
        }
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// Ledger row for this execution
    pub fn to_record(&self) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: self.execution_id.clone(),
            start_url: self.start_url.clone(),
            config_hash: self.config_hash.clone(),
            status: self.status,
            started_at: self.started_at,
            ended_at: self.ended_at,
            phases_completed: self
                .phases_completed
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            pages_processed: self.statistics.pages_processed as u64,
            elements_analyzed: self.statistics.elements_analyzed as u64,
            screenshots_captured: self.statistics.screenshots_captured as u64,
            word_count: self.statistics.word_count as u64,
            error_message: (!self.errors.is_empty()).then(|| self.errors.join("; ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_phase_records_error_and_statistics() {
        let mut execution = PipelineExecution::start("https://example.test/", "hash");
        execution.statistics.pages_processed = 3;
        execution.complete_phase(PipelinePhase::Crawl);

        let error = execution.fail_phase(PipelinePhase::Analyze, "bad data");
        assert_eq!(execution.errors, vec!["analyze phase failed: bad data"]);
        match error {
            PipelineError::PhaseFailure {
                phase, statistics, ..
            } => {
                assert_eq!(phase, PipelinePhase::Analyze);
                assert_eq!(statistics.pages_processed, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_finish_happens_once() {
        let mut execution = PipelineExecution::start("https://example.test/", "hash");
        assert!(!execution.is_finished());

        execution.finish(ExecutionStatus::Failed);
        let ended = execution.ended_at;
        execution.finish(ExecutionStatus::Completed);

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.ended_at, ended);
        assert!(execution.duration_ms().unwrap() >= 0);
    }

    #[test]
    fn test_to_record() {
        let mut execution = PipelineExecution::start("https://example.test/", "hash");
        execution.complete_phase(PipelinePhase::Login);
        execution.complete_phase(PipelinePhase::Crawl);
        execution.complete_phase(PipelinePhase::Crawl);
        execution.statistics.word_count = 120;
        execution.finish(ExecutionStatus::Completed);

        let record = execution.to_record();
        assert_eq!(record.phases_completed, vec!["login", "crawl"]);
        assert_eq!(record.word_count, 120);
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert!(record.error_message.is_none());
    }
}
