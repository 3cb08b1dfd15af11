use super::outline::{introduction, screenshot_paths, section_heading};
use super::{ContentError, ContentWriter, ManualContent, ManualSection};
use crate::analysis::{CrawlAnalysis, PageAnalysis};
use crate::crawler::{CrawlOutput, PageRecord};
use crate::provider::{ChatMessage, FallbackRouter};
use async_trait::async_trait;
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "You write end-user documentation for web applications. \
Answer in Markdown without a top-level heading. Describe what the screen is for and \
how to use its controls, step by step where it helps.";

/// Elements included in a section prompt
const PROMPT_ELEMENTS: usize = 20;

/// Writes one section per page with an AI provider
pub struct ProviderContentWriter {
    router: FallbackRouter,
}

impl ProviderContentWriter {
    pub fn new(router: FallbackRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl ContentWriter for ProviderContentWriter {
    async fn write(
        &self,
        title: &str,
        crawl: &CrawlOutput,
        analysis: &CrawlAnalysis,
    ) -> Result<ManualContent, ContentError> {
        let mut sections = Vec::with_capacity(crawl.pages.len());

        for (index, (page, page_analysis)) in crawl.pages.iter().zip(&analysis.pages).enumerate() {
            debug!(
                "Requesting section {}/{} for {}",
                index + 1,
                crawl.pages.len(),
                page.url
            );
            let body = self
                .router
                .complete(vec![
                    ChatMessage::system(SYSTEM_PROMPT),
                    ChatMessage::user(section_prompt(page, page_analysis)),
                ])
                .await?;

            sections.push(ManualSection {
                heading: section_heading(page),
                page_url: page.url.clone(),
                category: page_analysis.category,
                body: body.trim().to_string(),
                screenshots: screenshot_paths(page),
            });
        }

        info!("Wrote {} sections with provider assistance", sections.len());
        Ok(ManualContent::new(title, introduction(analysis), sections))
    }
}

fn section_prompt(page: &PageRecord, analysis: &PageAnalysis) -> String {
    let mut prompt = format!(
        "Screen: {}\nURL: {}\nKind: {}\n",
        section_heading(page),
        page.url,
        analysis.category
    );

    if !page.elements.is_empty() {
        prompt.push_str("\nControls:\n");
        for element in page.elements.iter().take(PROMPT_ELEMENTS) {
            prompt.push_str(&format!(
                "- {} \"{}\": {}\n",
                element.element_type, element.text, element.functionality
            ));
        }
    }

    if !page.navigation.is_empty() {
        let labels: Vec<&str> = page.navigation.iter().map(|n| n.text.as_str()).collect();
        prompt.push_str(&format!("\nNavigation: {}\n", labels.join(", ")));
    }

    prompt.push_str("\nWrite the manual section for this screen.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::analysis::tests::{crawl, element, page};
    use crate::config::{ProviderConfig, ProviderKind, ProvidersConfig};
    use crate::detector::ElementType;
    use crate::provider::ProviderError;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn providers(server: &MockServer, dir: &TempDir) -> ProvidersConfig {
        ProvidersConfig {
            max_retries: 1,
            backoff_ms: 0,
            timeout_ms: 5_000,
            state_dir: dir.path().to_path_buf(),
            primary: Some(ProviderConfig {
                kind: ProviderKind::OpenAi,
                base_url: Some(server.uri()),
                model: "test-model".to_string(),
                keys: vec!["key-1".to_string()],
                keys_env: None,
                daily_limit: 100,
                max_tokens: 256,
                temperature: 0.2,
            }),
            fallback: None,
        }
    }

    #[test]
    fn test_prompt_lists_controls() {
        let record = page(
            "https://example.test/settings",
            "Settings",
            vec![element(ElementType::Button, "Save", &[])],
        );
        let analysis = analyze(&crawl(vec![record.clone()]));
        let prompt = section_prompt(&record, &analysis.pages[0]);
        assert!(prompt.contains("Screen: Settings"));
        assert!(prompt.contains("Kind: settings"));
        assert!(prompt.contains("button \"Save\""));
    }

    #[tokio::test]
    async fn test_sections_come_from_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "  Use this screen to change settings.  "}}]
            })))
            .expect(2)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let router = FallbackRouter::from_config(&providers(&server, &dir)).unwrap();

        let output = crawl(vec![
            page("https://example.test/", "Home", vec![]),
            page("https://example.test/settings", "Settings", vec![]),
        ]);
        let analysis = analyze(&output);
        let content = ProviderContentWriter::new(router)
            .write("Guide", &output, &analysis)
            .await
            .unwrap();

        assert_eq!(content.sections.len(), 2);
        assert_eq!(content.sections[1].body, "Use this screen to change settings.");
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let router = FallbackRouter::from_config(&providers(&server, &dir)).unwrap();

        let output = crawl(vec![page("https://example.test/", "Home", vec![])]);
        let analysis = analyze(&output);
        let result = ProviderContentWriter::new(router)
            .write("Guide", &output, &analysis)
            .await;

        assert!(matches!(
            result,
            Err(ContentError::Provider(ProviderError::AllProvidersFailed { .. }))
        ));
    }
}
