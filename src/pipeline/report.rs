//! Execution reports
//!
//! Every finished execution is written twice to `{output}/reports`: the full
//! execution as JSON and a Markdown summary for people.

use super::{PipelineError, PipelineExecution, PipelinePhase};
use crate::storage::ExecutionStatus;
use std::path::{Path, PathBuf};

/// Files written by [`write_reports`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Writes `execution-{id}.json` and `report-{id}.md` into `dir`
pub fn write_reports(
    execution: &PipelineExecution,
    dir: &Path,
) -> Result<ReportPaths, PipelineError> {
    std::fs::create_dir_all(dir)?;

    let json = dir.join(format!("execution-{}.json", execution.execution_id));
    std::fs::write(&json, serde_json::to_vec_pretty(execution)?)?;

    let markdown = dir.join(format!("report-{}.md", execution.execution_id));
    std::fs::write(&markdown, render_report(execution))?;

    Ok(ReportPaths { json, markdown })
}

/// Formats an execution as a Markdown report
pub fn render_report(execution: &PipelineExecution) -> String {
    let mut md = String::new();

    let heading = match execution.status {
        ExecutionStatus::Completed => "Manual Generation Report",
        ExecutionStatus::Running => "Manual Generation Report (in progress)",
        ExecutionStatus::Failed | ExecutionStatus::Interrupted => "Manual Generation Error Report",
    };
    md.push_str(&format!("# {}\n\n", heading));

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Execution ID**: {}\n", execution.execution_id));
    md.push_str(&format!("- **Start URL**: {}\n", execution.start_url));
    md.push_str(&format!("- **Started**: {}\n", execution.started_at.to_rfc3339()));
    if let Some(ended) = execution.ended_at {
        md.push_str(&format!("- **Finished**: {}\n", ended.to_rfc3339()));
    }
    if let Some(duration) = execution.duration_ms() {
        md.push_str(&format!(
            "- **Duration**: {:.2} seconds\n",
            duration as f64 / 1000.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", execution.status));
    md.push_str(&format!("- **Config Hash**: {}\n\n", execution.config_hash));

    md.push_str("## Phases\n\n");
    md.push_str("| Phase | Status |\n");
    md.push_str("|-------|--------|\n");
    let failed = execution.errors.first();
    let mut failure_shown = false;
    for phase in PipelinePhase::ALL {
        let status = if execution.phases_completed.contains(&phase) {
            "completed"
        } else if failed.map_or(false, |e| e.starts_with(phase.as_str())) {
            failure_shown = true;
            "failed"
        } else if failure_shown || execution.is_finished() {
            "not run"
        } else {
            "pending"
        };
        md.push_str(&format!("| {} | {} |\n", phase, status));
    }
    md.push('\n');

    let stats = &execution.statistics;
    md.push_str("## Statistics\n\n");
    md.push_str(&format!("- **Pages Processed**: {}\n", stats.pages_processed));
    md.push_str(&format!("- **Elements Analyzed**: {}\n", stats.elements_analyzed));
    md.push_str(&format!(
        "- **Screenshots Captured**: {}\n",
        stats.screenshots_captured
    ));
    md.push_str(&format!("- **Word Count**: {}\n\n", stats.word_count));

    if !execution.document_paths.is_empty() {
        md.push_str("## Documents\n\n");
        for path in &execution.document_paths {
            md.push_str(&format!("- `{}`\n", path.display()));
        }
        md.push('\n');
    }

    if !execution.errors.is_empty() {
        md.push_str("## Errors\n\n");
        for error in &execution.errors {
            md.push_str(&format!("- {}\n", error));
        }
        md.push('\n');
    }

    if !execution.phase_reports.is_empty() {
        md.push_str("## Phase Reports\n\n");
        for report in &execution.phase_reports {
            md.push_str(report.trim_end());
            md.push_str("\n\n");
        }
    }

    md.push_str("---\n\n*Generated by ManualForge*\n");
    md
}
