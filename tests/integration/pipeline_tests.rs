//! Integration tests for the full pipeline
//!
//! The browser is the in-memory fixture; the AI provider, where one is used,
//! is a wiremock server speaking the Chat Completions API.

use manualforge::browser::{FixtureBrowser, FixturePage};
use manualforge::config::{AuthConfig, Config, ProviderConfig, ProviderKind};
use manualforge::pipeline::{PipelineError, PipelinePhase};
use manualforge::storage::{ExecutionStatus, Storage};
use manualforge::Pipeline;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::for_start_url("https://app.example.test/");
    config.crawler.max_depth = 1;
    config.crawler.page_delay_ms = 0;
    config.crawler.element_delay_ms = 0;
    config.crawler.selector_timeout_ms = 100;
    config.crawler.navigation_retries = 1;
    config.screenshots.cache_dir = dir.path().join("screenshots");
    config.screenshots.cache_file = dir.path().join("screenshots/cache.json");
    config.providers.state_dir = dir.path().join("state");
    config.providers.backoff_ms = 10;
    config.output.dir = dir.path().join("output");
    config.output.database_path = dir.path().join("output/manualforge.db");
    config
}

fn application() -> FixtureBrowser {
    FixtureBrowser::new()
        .with_page(
            "https://app.example.test/login",
            FixturePage::new(
                "Sign in",
                r#"<form><input type="email" name="email"><input type="password" name="password">
                <button type="submit">Sign in</button></form>"#,
            ),
        )
        .with_page(
            "https://app.example.test/",
            FixturePage::with_links("Dashboard", &["/projects", "/settings"]),
        )
        .with_page(
            "https://app.example.test/projects",
            FixturePage::with_links("Projects", &[]),
        )
        .with_page(
            "https://app.example.test/settings",
            FixturePage::with_links("Account Settings", &[]),
        )
        .with_login("ops@example.test", "s3cret", "https://app.example.test/")
}

#[tokio::test]
async fn test_login_crawl_and_provider_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant",
                "content": "Open this screen from the main menu to review your work." } }]
        })))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    let mut auth = AuthConfig::new("ops@example.test", "s3cret");
    auth.login_url = Some("https://app.example.test/login".to_string());
    config.auth = Some(auth);
    config.providers.primary = Some(ProviderConfig {
        kind: ProviderKind::OpenAi,
        base_url: Some(server.uri()),
        model: "gpt-test".to_string(),
        keys: vec!["test-key".to_string()],
        keys_env: None,
        daily_limit: 100,
        max_tokens: 256,
        temperature: 0.2,
    });

    let browser = Arc::new(application());
    let mut pipeline = Pipeline::new(config, "test-hash", browser.clone()).unwrap();
    let execution = pipeline.run().await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.phases_completed, PipelinePhase::ALL.to_vec());
    assert_eq!(execution.statistics.pages_processed, 3);
    assert_eq!(execution.statistics.screenshots_captured, 3);
    assert!(execution.errors.is_empty());

    let manual = std::fs::read_to_string(&execution.document_paths[0]).unwrap();
    assert!(manual.contains("# app.example.test User Manual"));
    assert!(manual.contains("Account Settings"));
    assert!(manual.contains("review your work"));

    let ledger = pipeline.storage();
    assert_eq!(ledger.count_pages(&execution.execution_id).unwrap(), 3);
    assert_eq!(ledger.count_tasks(&execution.execution_id).unwrap(), 5);
    assert_eq!(ledger.count_failed_tasks(&execution.execution_id).unwrap(), 0);

    pipeline.shutdown().await;
    assert!(browser.is_closed());
    assert!(dir.path().join("state/primary-openai-keys.json").exists());
    server.verify().await;
}

#[tokio::test]
async fn test_crawl_failure_stops_later_phases() {
    let dir = TempDir::new().unwrap();
    let browser = Arc::new(FixtureBrowser::new().with_page(
        "https://app.example.test/elsewhere",
        FixturePage::with_links("Elsewhere", &[]),
    ));
    let mut pipeline = Pipeline::new(create_test_config(&dir), "test-hash", browser).unwrap();

    let error = pipeline.run().await.unwrap_err();
    assert!(matches!(
        error,
        PipelineError::PhaseFailure {
            phase: PipelinePhase::Crawl,
            ..
        }
    ));

    let execution = pipeline.last_execution().unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.ended_at.is_some());
    assert!(!execution.errors.is_empty());
    assert!(execution.phases_completed.is_empty());
    assert!(execution.document_paths.is_empty());

    let history = pipeline.runtime().history();
    assert_eq!(history.len(), 1);
    for later in ["analyze", "content", "generate"] {
        assert_eq!(history.for_agent(later).count(), 0);
    }

    let report = dir
        .path()
        .join(format!("output/reports/report-{}.md", execution.execution_id));
    let report = std::fs::read_to_string(report).unwrap();
    assert!(report.contains("Error Report"));
    assert!(report.contains("| crawl | failed |"));
    assert!(!dir.path().join("output/manual.md").exists());
}

#[tokio::test]
async fn test_outline_manual_without_providers() {
    let dir = TempDir::new().unwrap();
    let browser = Arc::new(application());
    let mut pipeline = Pipeline::new(create_test_config(&dir), "test-hash", browser).unwrap();

    let execution = pipeline.run().await.unwrap();
    assert_eq!(execution.phases_completed.first(), Some(&PipelinePhase::Crawl));
    assert!(execution.statistics.word_count > 0);

    let history = pipeline.storage().latest_executions(5).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].execution_id, execution.execution_id);
}
