use super::{ContentError, ManualContent};
use crate::config::{OutputConfig, OutputFormat};
use crate::storage::ObjectStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

const MARKDOWN_FILE: &str = "manual.md";

/// Files produced by the Generate phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedDocuments {
    pub format: OutputFormat,
    pub markdown: PathBuf,
    /// HTML or PDF rendering, when one was requested and a renderer is configured
    pub rendered: Option<PathBuf>,
    pub remote_urls: Vec<String>,
}

impl GeneratedDocuments {
    pub fn paths(&self) -> Vec<PathBuf> {
        std::iter::once(self.markdown.clone())
            .chain(self.rendered.clone())
            .collect()
    }
}

/// Writes the manual to the output directory
pub struct DocumentWriter {
    output_dir: PathBuf,
    html_command: Option<String>,
    pdf_command: Option<String>,
    remote: Option<(Arc<dyn ObjectStore>, String)>,
}

impl DocumentWriter {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            output_dir: config.dir.clone(),
            html_command: config.html_command.clone(),
            pdf_command: config.pdf_command.clone(),
            remote: None,
        }
    }

    /// Uploads every written document to `bucket`
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>, bucket: &str) -> Self {
        self.remote = Some((store, bucket.to_string()));
        self
    }

    /// Writes `manual.md` and, for HTML or PDF, the rendered document
    ///
    /// A missing renderer command is not an error: the Markdown file is the
    /// only output and a warning is logged.
    pub async fn write(
        &self,
        content: &ManualContent,
        format: OutputFormat,
    ) -> Result<GeneratedDocuments, ContentError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let markdown = self.output_dir.join(MARKDOWN_FILE);
        std::fs::write(&markdown, render_markdown(content))?;
        info!("Wrote {}", markdown.display());

        let rendered = match format {
            OutputFormat::Markdown => None,
            OutputFormat::Html | OutputFormat::Pdf => {
                let command = match format {
                    OutputFormat::Html => self.html_command.as_deref(),
                    _ => self.pdf_command.as_deref(),
                };
                match command {
                    Some(command) => {
                        let target = markdown.with_extension(format.extension());
                        run_renderer(command, format, &markdown, &target).await?;
                        info!("Rendered {}", target.display());
                        Some(target)
                    }
                    None => {
                        warn!(
                            "No {}-command configured, producing Markdown only",
                            format.as_str()
                        );
                        None
                    }
                }
            }
        };

        let mut documents = GeneratedDocuments {
            format,
            markdown,
            rendered,
            remote_urls: Vec::new(),
        };
        documents.remote_urls = self.upload(&documents).await;
        Ok(documents)
    }

    async fn upload(&self, documents: &GeneratedDocuments) -> Vec<String> {
        let Some((store, bucket)) = &self.remote else {
            return Vec::new();
        };

        let mut urls = Vec::new();
        for path in documents.paths() {
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Cannot read {} for upload: {}", path.display(), e);
                    continue;
                }
            };
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| MARKDOWN_FILE.to_string());
            let content_type = content_type(&path);
            if let Some(url) = store
                .put_object(bucket, &format!("documents/{}", name), bytes, content_type)
                .await
            {
                urls.push(url);
            }
        }
        urls
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("pdf") => "application/pdf",
        _ => "text/markdown; charset=utf-8",
    }
}

/// Runs a renderer command template such as `pandoc {input} -o {output}`
///
/// The template is split on whitespace and run without a shell.
async fn run_renderer(
    template: &str,
    format: OutputFormat,
    input: &Path,
    output: &Path,
) -> Result<(), ContentError> {
    let renderer_error = |message: String| ContentError::Renderer {
        format: format.as_str().to_string(),
        message,
    };

    let args: Vec<String> = template
        .split_whitespace()
        .map(|arg| {
            arg.replace("{input}", &input.to_string_lossy())
                .replace("{output}", &output.to_string_lossy())
        })
        .collect();
    let Some((program, rest)) = args.split_first() else {
        return Err(renderer_error("empty command".to_string()));
    };

    let result = Command::new(program)
        .args(rest)
        .output()
        .await
        .map_err(|e| renderer_error(format!("cannot run {}: {}", program, e)))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(renderer_error(format!(
            "{} exited with {}: {}",
            program,
            result.status,
            stderr.trim()
        )));
    }
    if !output.exists() {
        return Err(renderer_error(format!("{} did not create {}", program, output.display())));
    }
    Ok(())
}

/// Lays out the manual as a single Markdown document
pub fn render_markdown(content: &ManualContent) -> String {
    let mut doc = format!("# {}\n\n{}\n\n", content.title, content.introduction.trim());

    if !content.sections.is_empty() {
        doc.push_str("## Contents\n\n");
        for (index, section) in content.sections.iter().enumerate() {
            doc.push_str(&format!(
                "{}. [{}](#{})\n",
                index + 1,
                section.heading,
                anchor(&section.heading)
            ));
        }
        doc.push('\n');
    }

    for section in &content.sections {
        doc.push_str(&format!("## {}\n\n", section.heading));
        doc.push_str(&format!("<{}>\n\n", section.page_url));
        for shot in &section.screenshots {
            let link = std::fs::canonicalize(shot).unwrap_or_else(|_| shot.clone());
            doc.push_str(&format!("![{}]({})\n\n", section.heading, link.display()));
        }
        doc.push_str(section.body.trim());
        doc.push_str("\n\n");
    }

    doc.push_str(&format!(
        "---\n\n_Generated {} ({} words)_\n",
        content.generated_at.format("%Y-%m-%d %H:%M UTC"),
        content.word_count
    ));
    doc
}

/// GitHub-style heading anchor
fn anchor(heading: &str) -> String {
    heading
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            ' ' => Some('-'),
            _ => None,
        })
        .collect()
}
