//! feedstr: mirror RSS/Atom/JSON feeds onto Nostr.
//!
//! # Usage
//!
//! ```bash
//! # Sync every configured feed once
//! feedstr --config /etc/feedstr/feedstr.toml
//!
//! # Preview what one feed would publish
//! feedstr --feed "Example Blog" --dry-run
//!
//! # Keep running, syncing every 15 minutes
//! feedstr --interval 900 --metrics-file /var/lib/node_exporter/feedstr.prom
//! ```
//!
//! # Graceful Shutdown
//!
//! Ctrl+C cancels in-flight requests; the current feed aborts, the remaining
//! feeds are not started, and the process exits with a failure status.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use feedstr_core::metrics::init_metrics;
use feedstr_core::{IoScope, ReconcileOptions};
use feedstr_sync::config::DEFAULT_CONFIG_PATH;
use feedstr_sync::{
    BatchOptions, Config, HtmlToMarkdown, HttpFeedSource, RelayLedger, run_batch,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing_subscriber::EnvFilter;

/// Mirror syndication feeds onto Nostr relays.
#[derive(Parser, Debug)]
#[command(name = "feedstr")]
#[command(about = "Mirror RSS/Atom/JSON feeds onto Nostr relays")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, env = "FEEDSTR_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Path to a .env file to load before reading the config
    #[arg(long, default_value = ".env")]
    dotenv: PathBuf,

    /// Only sync the named feed (repeatable)
    #[arg(long = "feed", value_name = "NAME")]
    feeds: Vec<String>,

    /// Log what would be published without publishing
    #[arg(long)]
    dry_run: bool,

    /// Do not publish profile updates
    #[arg(long)]
    skip_profiles: bool,

    /// Repeat the batch every SECS seconds until interrupted
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Write Prometheus metrics to this file after each batch
    #[arg(long, value_name = "PATH")]
    metrics_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Install rustls crypto provider (required when both ring and aws-lc-rs are present)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    let args = Args::parse();

    // A missing .env is fine; a malformed one is not.
    match dotenvy::from_path(&args.dotenv) {
        Ok(()) => {}
        Err(e) if e.not_found() => {}
        Err(e) => {
            return Err(e).with_context(|| format!("failed to load {}", args.dotenv.display()));
        }
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,feedstr_core=debug,feedstr_sync=debug")),
        )
        .init();

    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    let feeds = config.select(&args.feeds)?;

    tracing::info!("Configuration:");
    tracing::info!("  Config: {}", args.config.display());
    tracing::info!("  Relays: {}", config.relays.join(", "));
    tracing::info!("  Feeds: {}", feeds.len());
    tracing::info!("  Request timeout: {:?}", config.request_timeout);
    if args.dry_run {
        tracing::info!("  Dry run: nothing will be published");
    }

    let metrics_handle = match &args.metrics_file {
        Some(_) => Some(init_metrics().context("metrics recorder already installed")?),
        None => None,
    };

    // Set up graceful shutdown
    let root = IoScope::new(config.request_timeout);
    let shutdown = root.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, cancelling in-flight requests...");
        shutdown.cancel();
    })
    .context("Failed to set Ctrl+C handler")?;

    // Relays that never finish sending stored events must not use up the
    // whole request timeout.
    let ledger = RelayLedger::connect(&config.relays, config.request_timeout / 2)
        .await
        .context("failed to connect to relays")?;
    let source = HttpFeedSource::new(config.request_timeout)?;

    let options = BatchOptions {
        reconcile: ReconcileOptions {
            history_page_size: config.history_page_size,
            dry_run: args.dry_run,
            ..Default::default()
        },
        skip_profiles: args.skip_profiles,
    };

    let mut all_succeeded = true;
    loop {
        let summary = run_batch(&ledger, &source, &HtmlToMarkdown, &feeds, &options, &root).await;
        summary.log();
        all_succeeded &= summary.is_success();

        if let (Some(path), Some(handle)) = (&args.metrics_file, &metrics_handle) {
            write_metrics(path, handle)?;
        }

        let Some(secs) = args.interval else { break };
        if root.is_cancelled() {
            break;
        }

        tracing::info!("Next batch in {}s", secs);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            _ = root.cancelled() => break,
        }
    }

    ledger.disconnect().await;

    if all_succeeded {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Write the Prometheus rendering atomically, for a textfile collector.
fn write_metrics(path: &Path, handle: &PrometheusHandle) -> Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, handle.render())
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move metrics into {}", path.display()))?;
    tracing::debug!(path = %path.display(), "metrics written");
    Ok(())
}
