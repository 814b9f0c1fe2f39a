//! CLI tool for turning issue slides in PowerPoint decks into Jira tickets.

use anyhow::{Context, Result};
use clap::Parser;
use deck_core::{ProcessingConfig, ReportFormatter};
use deck_pipeline::Pipeline;
use std::path::PathBuf;
use std::process::ExitCode;

/// Find issue slides in a PowerPoint deck and file them as Jira tickets.
#[derive(Parser, Debug)]
#[command(name = "deck2jira")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input PowerPoint file (.pptx)
    deck: PathBuf,

    /// Analyze slides but do not create tickets
    #[arg(short, long)]
    dry_run: bool,

    /// Keep the work directory with the PDF and slide images
    #[arg(short = 'v', long)]
    debug: bool,

    /// Send every ticket to this project, ignoring slide rules
    #[arg(short, long)]
    project_key: Option<String>,

    /// Maximum concurrent AI requests
    #[arg(short = 't', long)]
    max_concurrent: Option<usize>,

    /// JSON file with detection patterns and project rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&args).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<ExitCode> {
    if !args.deck.is_file() {
        anyhow::bail!("File not found: {}", args.deck.display());
    }

    let config = load_config(args)?;
    let pipeline = Pipeline::from_config(&config).context("Failed to set up pipeline")?;

    let report = pipeline
        .run(&args.deck)
        .await
        .with_context(|| format!("Failed to process {}", args.deck.display()))?;

    let formatter = ReportFormatter::new().with_verbose(args.verbose);
    print!("{}", formatter.format(&report));

    if report.is_failure() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Environment configuration with command-line flags layered on top.
fn load_config(args: &Args) -> Result<ProcessingConfig> {
    let mut config = ProcessingConfig::from_env().context("Failed to load configuration")?;

    config.dry_run = args.dry_run;
    config.debug = args.debug;
    if let Some(key) = &args.project_key {
        config.project_key = Some(key.clone());
    }
    if let Some(max) = args.max_concurrent {
        config.max_concurrent_requests = max;
    }
    if let Some(rules) = &args.rules {
        config.rules_path = Some(rules.clone());
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}
