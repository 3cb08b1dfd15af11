//! ManualForge main entry point
//!
//! This is the command-line interface for the ManualForge manual generator.

use anyhow::Context;
use clap::Parser;
use manualforge::browser::{BrowserSession, WebDriverSession};
use manualforge::config::{load_config_with_hash, validate, Config, OutputFormat, Overrides};
use manualforge::Pipeline;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// ManualForge: turn a web application into a user manual
///
/// ManualForge logs in to the application, crawls its screens breadth-first,
/// detects the interactive elements on each one, captures screenshots and
/// writes a manual from what it found.
#[derive(Parser, Debug)]
#[command(name = "manualforge")]
#[command(version = "1.0.0")]
#[command(about = "Generate a user manual by crawling a web application", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Start URL of the application (overrides the config file)
    #[arg(long)]
    url: Option<String>,

    /// Username for the login form
    #[arg(long)]
    login: Option<String>,

    /// Password for the login form
    #[arg(long)]
    password: Option<String>,

    /// Format of the generated manual
    #[arg(long, value_enum)]
    output_format: Option<OutputFormat>,

    /// Capture screenshots of every page
    #[arg(long)]
    screenshots: Option<bool>,

    /// Attempts per provider call and per page navigation
    #[arg(long)]
    max_retries: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            url: self.url.clone(),
            login: self.login.clone(),
            password: self.password.clone(),
            output_format: self.output_format,
            screenshots: self.screenshots,
            max_retries: self.max_retries,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("manualforge=info,warn"),
            1 => EnvFilter::new("manualforge=debug,info"),
            2 => EnvFilter::new("manualforge=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, if any, and layers the CLI flags over it
fn load(cli: &Cli) -> anyhow::Result<(Config, String)> {
    let (mut config, hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => {
            let url = cli
                .url
                .as_deref()
                .context("Either --config or --url is required")?;
            (Config::for_start_url(url), String::from("cli"))
        }
    };

    config.apply_overrides(&cli.overrides());
    validate(&config)?;
    Ok((config, hash))
}

/// Runs the pipeline; `Ok(false)` means the pipeline itself failed
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let (config, hash) = load(&cli)?;

    let browser: Arc<dyn BrowserSession> = Arc::new(
        WebDriverSession::connect(&config.browser)
            .await
            .with_context(|| format!("Cannot reach WebDriver at {}", config.browser.webdriver_url))?,
    );

    let mut pipeline = match Pipeline::new(config, &hash, browser.clone()) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            let _ = browser.close().await;
            return Err(e).context("Failed to set up the pipeline");
        }
    };

    if let Err(e) = pipeline.initialize().await {
        pipeline.shutdown().await;
        return Err(e).context("Failed to initialize agents");
    }

    let outcome = tokio::select! {
        result = pipeline.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let succeeded = match outcome {
        Some(Ok(execution)) => {
            println!("Manual generated in {} phases", execution.phases_completed.len());
            for path in &execution.document_paths {
                println!("  {}", path.display());
            }
            true
        }
        Some(Err(e)) => {
            tracing::error!("Pipeline failed: {}", e);
            false
        }
        None => {
            tracing::warn!("Interrupted, shutting down");
            false
        }
    };

    pipeline.shutdown().await;
    Ok(succeeded)
}
