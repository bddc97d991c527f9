//! blockdl - Block data downloader
//!
//! Streams a table from the web3dl API and writes it to CSV.

use blockdl_client::{StreamClient, StreamRequest};
use blockdl_core::{Config, CsvSink, Pipeline, PipelineOutcome, PipelineStatus, ProgressTracker};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blockdl")]
#[command(about = "Download blockchain tables from a framed binary stream to CSV")]
#[command(version)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, env = "BLOCKDL_CONFIG")]
    config: Option<PathBuf>,

    /// Stream endpoint base URL
    #[arg(long)]
    api_url: Option<String>,

    /// API key
    #[arg(long, env = "WEB3DL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chain to download (e.g. eth)
    #[arg(long)]
    chain: String,

    /// Table to download (e.g. blocks)
    #[arg(long)]
    table: String,

    /// First block number (inclusive)
    #[arg(long)]
    from: Option<u32>,

    /// Last block number (inclusive)
    #[arg(long)]
    until: Option<u32>,

    /// Output CSV path (defaults to <data_dir>/<file_name> from config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Append to the output file instead of truncating it (for resuming)
    #[arg(long)]
    append: bool,

    /// Largest accepted record payload in bytes (0 = unlimited)
    #[arg(long)]
    max_payload: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };

    match run(&cli, &config).await {
        Ok(outcome) => {
            print_summary(&cli, &config, &outcome);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Download failed".red(), e);
            std::process::exit(1);
        }
    }
}

/// Merges config file, environment and command-line flags, in that order.
fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::from_file(path)?;
            config.apply_env_overrides();
            tracing::info!("Loaded config from {}", path.display());
            config
        }
        None => Config::load()?,
    };

    if let Some(ref url) = cli.api_url {
        config.api.base_url = url.clone();
    }
    if let Some(ref key) = cli.api_key {
        config.api.api_key = Some(key.clone());
    }
    if let Some(max) = cli.max_payload {
        config.decoder.max_payload_size = max;
    }

    config.validate()?;
    Ok(config)
}

fn stream_request(cli: &Cli) -> StreamRequest {
    let mut request = StreamRequest::new(&cli.chain, &cli.table);
    if let Some(from) = cli.from {
        request = request.with_from(from);
    }
    if let Some(until) = cli.until {
        request = request.with_until(until);
    }
    request
}

async fn run(cli: &Cli, config: &Config) -> Result<PipelineOutcome, Box<dyn std::error::Error>> {
    let request = stream_request(cli);
    let output = output_path(cli, config);

    tracing::info!("Starting download");
    tracing::info!("  Endpoint: {}", request.url(&config.api.base_url));
    tracing::info!(
        "  Output: {} ({})",
        output.display(),
        if cli.append { "append" } else { "truncate" }
    );
    match config.decoder.max_payload() {
        Some(max) => tracing::info!("  Max payload: {} bytes", max),
        None => tracing::info!("  Max payload: unlimited"),
    }

    let client = StreamClient::new(config.client_config())?;
    let mut stream = client.open(&request).await?;

    let sink = if cli.append {
        CsvSink::append(&output, config.output.batch_size)?
    } else {
        CsvSink::create(&output, config.output.batch_size)?
    };
    let progress = ProgressTracker::new(config.progress.update_interval);
    let mut pipeline = Pipeline::new((sink, progress));

    // Spawn shutdown signal handler
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping download...");
        let _ = shutdown_tx.send(());
    });

    let outcome = pipeline.run(&mut stream, &mut shutdown_rx).await?;
    Ok(outcome)
}

fn output_path(cli: &Cli, config: &Config) -> PathBuf {
    cli.output.clone().unwrap_or_else(|| config.output_path())
}

/// Builds the arguments that continue a cancelled download into the same file.
///
/// Returns `None` when the last consumed record was the final one requested.
fn resume_args(cli: &Cli, output: &Path, last_sequence_key: Option<u32>) -> Option<String> {
    let request = stream_request(cli);
    let resume = match last_sequence_key {
        Some(key) => request.resume_after(key)?,
        None => request,
    };

    let mut args = format!("--chain {} --table {}", resume.chain, resume.table);
    if let Some(from) = resume.from {
        args.push_str(&format!(" --from {}", from));
    }
    if let Some(until) = resume.until {
        args.push_str(&format!(" --until {}", until));
    }
    args.push_str(&format!(" --output {} --append", output.display()));
    Some(args)
}

fn print_summary(cli: &Cli, config: &Config, outcome: &PipelineOutcome) {
    let output = output_path(cli, config);
    let last = outcome
        .last_sequence_key
        .map(|k| k.to_string())
        .unwrap_or_else(|| "-".to_string());

    match outcome.status {
        PipelineStatus::Completed => {
            println!(
                "{} {} records from {}/{}",
                "Downloaded".green(),
                outcome.records,
                cli.chain.cyan(),
                cli.table.cyan()
            );
        }
        PipelineStatus::Cancelled => {
            println!(
                "{} after {} records from {}/{}",
                "Cancelled".yellow(),
                outcome.records,
                cli.chain.cyan(),
                cli.table.cyan()
            );
        }
    }
    println!("  {}: {}", "Last block".bold(), last);
    println!("  {}: {} bytes", "Received".bold(), outcome.stats.bytes_read);
    println!("  {}: {}", "Output".bold(), output.display());

    if outcome.status == PipelineStatus::Cancelled {
        if let Some(args) = resume_args(cli, &output, outcome.last_sequence_key) {
            println!("{}", format!("Resume with: {}", args).dimmed());
        }
    }
}
