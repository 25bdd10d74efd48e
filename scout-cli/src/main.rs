//! Scout CLI — run one research task from the terminal.

use anyhow::{bail, Context};
use clap::Parser;
use scout_core::{load_config, ReportType, ResearchEngine, ResearchTask};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Scout: an autonomous research agent
#[derive(Parser, Debug)]
#[command(name = "scout", version, about, long_about = None)]
struct Cli {
    /// Research question to answer
    query: String,

    /// Report type: summary, detailed, outline, custom
    #[arg(short, long, default_value = "summary")]
    report_type: String,

    /// Synthesis instructions (report type "custom" only)
    #[arg(long)]
    prompt: Option<String>,

    /// Workspace directory (searched for scout.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scout_core={default_level},scout={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // .env must load before the engine resolves api_key_env vars
    let _ = dotenvy::dotenv();
    init_tracing(cli.verbose);

    let report_type: ReportType = cli
        .report_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    if cli.prompt.is_some() && report_type != ReportType::Custom {
        warn!("--prompt is only used with --report-type custom");
    }

    let config = load_config(Some(&cli.workspace), cli.config.as_deref())
        .context("failed to load configuration")?;
    let engine = ResearchEngine::new(config).context("failed to initialize research engine")?;

    let mut task = ResearchTask::new(cli.query, report_type);
    if let Some(prompt) = cli.prompt {
        task = task.with_custom_prompt(prompt);
    }

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling research task");
            ctrl_c_cancel.cancel();
        }
    });

    info!(task_id = %task.id, "Starting research");
    let report = match engine.run(&task, cancel).await {
        Ok(report) => report,
        Err(e) => bail!("research failed: {e}"),
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &report.body)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{}", report.body),
    }

    if !report.sources.is_empty() {
        info!(sources = report.sources.len(), "Research complete");
    }
    Ok(())
}
