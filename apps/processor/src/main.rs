mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use resume_processor::config::Config;
use resume_processor::quota::store::JsonFileStore;
use resume_processor::{
    AccumulatedResult, ChannelListener, HttpBackend, PlanTier, ProcessorEvent, ResumeProcessor,
    ResumeUpload, UploadQuota,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::progress::CliProgress;

#[derive(Parser)]
#[command(
    name = "resume-processor",
    about = "Parse, ATS-score and optimize a resume in one run"
)]
struct Cli {
    /// Resume file (PDF, DOCX or plain text)
    input: PathBuf,

    /// Plan tier of the caller; overrides PLAN_TIER.
    /// One of: free, basic, one-day, premium, enterprise.
    #[arg(long)]
    tier: Option<PlanTier>,

    /// Rerun the whole pipeline up to N times after a stage failure
    #[arg(long, default_value_t = 0)]
    retry_on_error: u32,

    /// Write the result JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting resume-processor v{}", env!("CARGO_PKG_VERSION"));

    let endpoints = config.endpoints();
    info!("Stage services: {endpoints:?}");
    let backend = HttpBackend::new(endpoints, config.request_timeout)
        .context("Failed to build HTTP client")?;

    let store = Arc::new(JsonFileStore::new(&config.quota_store_path));
    let quota = UploadQuota::new(store, config.free_upload_limit);

    let (listener, mut events) = ChannelListener::new();
    let processor = ResumeProcessor::builder(Arc::new(backend), Arc::new(listener))
        .settings(config.pipeline_settings())
        .quota(quota)
        .build();

    let upload = ResumeUpload::from_path(&cli.input)
        .await
        .with_context(|| format!("Cannot open {}", cli.input.display()))?;
    let tier = cli.tier.unwrap_or(config.plan_tier);

    let view = CliProgress::spawn(processor.subscribe());
    processor.set_visible(true, Some(upload), tier);

    let outcome = await_outcome(&processor, &mut events, cli.retry_on_error).await;

    processor.set_visible(false, None, tier);
    view.finish();

    let result = outcome?;
    write_result(&result, cli.output.as_deref())
}

/// Waits for the run to finish, retrying stage failures while retries remain.
async fn await_outcome(
    processor: &ResumeProcessor,
    events: &mut tokio::sync::mpsc::UnboundedReceiver<ProcessorEvent>,
    mut retries_left: u32,
) -> Result<AccumulatedResult> {
    while let Some(event) = events.recv().await {
        match event {
            ProcessorEvent::Completed(result) => return Ok(result),
            ProcessorEvent::UpgradeRequired => {
                eprintln!("Free upload used. Upgrade your plan to process more resumes.");
            }
            ProcessorEvent::Failed {
                stage: Some(stage),
                message,
            } if retries_left > 0 => {
                retries_left -= 1;
                warn!("{stage} failed ({message}); retrying, {retries_left} retries left");
                processor.retry();
            }
            ProcessorEvent::Failed { message, .. } => return Err(anyhow!(message)),
        }
    }
    Err(anyhow!("processor stopped without a result"))
}

fn write_result(result: &AccumulatedResult, output: Option<&std::path::Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Cannot write {}", path.display()))?;
            info!("Result written to {}", path.display());
        }
        None => println!("{json}"),
    }
    if let Some(score) = result.ats_score() {
        info!("ATS score: {score}");
    }
    Ok(())
}
