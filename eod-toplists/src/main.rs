//! `eod-toplists` - daily EOD top-lists and market digest.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

use chrono::Utc;
use clap::{Parser, Subcommand};
use eod_common::{init_logging, Config, DatePolicyKind, Market};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use eod_toplists::bundle::Bundle;
use eod_toplists::data::YahooChartProvider;
use eod_toplists::digest::{DigestComposer, DIGEST_FILE};
use eod_toplists::pipeline::{run_fetch, run_fetch_and_digest};
use eod_toplists::RunError;

#[derive(Parser, Debug)]
#[command(name = "eod-toplists")]
#[command(version)]
#[command(about = "Daily end-of-day top lists and market digest for JPX / US equities", long_about = None)]
struct Cli {
    /// Config file (default: ~/.eod-toplists/config.json + secrets.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Market to run for (jp, us)
    #[arg(long, global = true)]
    market: Option<Market>,

    /// Date label strategy (last-session, close-cutoff)
    #[arg(long, global = true)]
    date_policy: Option<DatePolicyKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch quotes, rank, enrich and write the bundle
    Fetch,

    /// Compose a Markdown digest from an existing bundle
    Digest {
        /// Path to bundle.json
        #[arg(long)]
        bundle: PathBuf,

        /// Output path (default: digest.md next to the bundle)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Skip the narrative service and use the offline template
        #[arg(long)]
        no_llm: bool,
    },

    /// Fetch, then compose the digest
    Run {
        /// Output path for the digest (default: <out>/<date>/digest.md)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Skip the narrative service and use the offline template
        #[arg(long)]
        no_llm: bool,
    },
}

/// Flags take precedence over every other source, so they go in as the
/// highest-priority overrides.
fn load_config(cli: &Cli) -> Result<Config, RunError> {
    let mut flags = Vec::new();
    if let Some(market) = cli.market {
        flags.push(("EOD_MARKET", market.to_string()));
    }
    if let Some(policy) = cli.date_policy {
        flags.push(("EOD_DATE_POLICY", policy.to_string()));
    }
    Ok(Config::load(cli.config.as_deref(), &flags)?)
}

async fn run(cli: Cli, config: Config) -> Result<(), RunError> {
    match cli.command {
        Commands::Fetch => {
            let provider = YahooChartProvider::from_config(&config.fetch);
            let report = run_fetch(&config, provider, Utc::now()).await?;
            println!(
                "Wrote {} ({} rows, date {})",
                report.dir.display(),
                report.bundle.counts.universe_total,
                report.bundle.date
            );
        }
        Commands::Digest {
            bundle,
            out,
            no_llm,
        } => {
            let composer = DigestComposer::from_config(&config.narrative, no_llm)?;
            let loaded = Bundle::load(&bundle)?;
            let out = out.unwrap_or_else(|| {
                bundle
                    .parent()
                    .map_or_else(|| PathBuf::from(DIGEST_FILE), |dir| dir.join(DIGEST_FILE))
            });

            let digest = composer.compose(&loaded).await;
            let path = digest.save_to_file(&out)?;
            info!(
                path = %path.display(),
                bytes = digest.markdown.len(),
                fallback = digest.used_fallback(),
                "Digest written"
            );
            println!("Wrote {} ({} bytes)", path.display(), digest.markdown.len());
        }
        Commands::Run { out, no_llm } => {
            let provider = YahooChartProvider::from_config(&config.fetch);
            let report =
                run_fetch_and_digest(&config, provider, no_llm, out.as_deref(), Utc::now()).await?;
            println!("Wrote {}", report.fetch.dir.display());
            println!(
                "Wrote {} ({} bytes)",
                report.digest_path.display(),
                report.digest.markdown.len()
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    init_logging(&config.observability.log_level, &config.observability.log_format);
    info!(
        market = %config.market.market,
        date_policy = ?config.date_policy(),
        "eod-toplists starting"
    );

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, exit_code = e.exit_code(), "Run failed");
            eprintln!("ERROR: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
