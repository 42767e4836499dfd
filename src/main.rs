//! # bdbot: Slack birthday reminder
//!
//! Scans the main channel roster on a schedule, warns the manager about
//! upcoming birthdays and opens a celebration channel on the day itself.
//!
//! Usage:
//!   bdbot                           # ~/.bdbot/config.toml
//!   bdbot --config ./bdbot.toml     # Custom config
//!   bdbot --db /var/lib/bdbot.db -v # Custom cache path, debug logging

use anyhow::{Context, Result};
use bdbot_channels::{CommandListener, ListenerSettings, SlackClient, SlackRtmConnector};
use bdbot_core::BdBotConfig;
use bdbot_core::traits::RealtimeConnector;
use bdbot_scheduler::{
    BirthdayCache, BirthdayPipeline, PipelineSettings, SchedulerSettings, run_scheduler,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bdbot", version, about = "🎂 bdbot: Slack birthday reminder")]
struct Cli {
    /// Config file (default: ~/.bdbot/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Cache database path, overrides `db_path` from the config
    #[arg(long)]
    db: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Unable to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Unable to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "bdbot=debug,bdbot_core=debug,bdbot_channels=debug,bdbot_scheduler=debug"
    } else {
        "bdbot=info,bdbot_core=info,bdbot_channels=info,bdbot_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => BdBotConfig::load_from(&expand_path(path)),
        None => BdBotConfig::load(),
    }
    .context("unable to load config")?;
    let tz = config.timezone()?;

    let db_path = cli
        .db
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(|| config.expanded_db_path());
    let cache = Arc::new(
        BirthdayCache::open(&db_path, &config.manager_bucket, &config.channel_bucket)
            .with_context(|| format!("unable to open cache at {}", db_path.display()))?,
    );
    tracing::info!("🗄️  Cache: {}", db_path.display());

    let client = Arc::new(SlackClient::new(&config.slack)?);
    let connector = SlackRtmConnector::new(&config.slack)?;
    let session = connector
        .connect()
        .await
        .context("unable to connect to Slack")?;

    let pipeline = Arc::new(
        BirthdayPipeline::new(
            client.clone(),
            cache,
            PipelineSettings::from_config(&config),
        )
        .await
        .context("unable to find manager's DM")?,
    );
    let listener = CommandListener::new(connector, client, ListenerSettings::from_config(&config)?);

    tracing::info!("🎂 bdbot v{} started ({})", env!("CARGO_PKG_VERSION"), tz.name());

    let cancel = CancellationToken::new();

    // Whichever task finishes first cancels the other.
    let scheduler = tokio::spawn({
        let cancel = cancel.clone();
        let settings = SchedulerSettings::from_config(&config);
        async move {
            let clock = move || chrono::Utc::now().with_timezone(&tz);
            let result = run_scheduler(pipeline, settings, clock, cancel.clone()).await;
            cancel.cancel();
            result
        }
    });
    let listener = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let result = listener.run(Some(session), cancel.clone()).await;
            cancel.cancel();
            result
        }
    });

    tokio::select! {
        _ = shutdown_signal() => tracing::warn!("Shutdown signal received"),
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();

    let (scheduler, listener) = tokio::join!(scheduler, listener);
    let mut failure = None;
    for (name, joined) in [("birthday watcher", scheduler), ("message watcher", listener)] {
        match joined {
            Ok(Ok(())) => tracing::info!("{name} stopped"),
            Ok(Err(e)) => {
                tracing::error!("{name} failed: {e}");
                failure.get_or_insert_with(|| anyhow::anyhow!("{name} failed: {e}"));
            }
            Err(e) => {
                tracing::error!("{name} panicked: {e}");
                failure.get_or_insert_with(|| anyhow::anyhow!("{name} panicked: {e}"));
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => {
            tracing::info!("👋 bdbot stopped");
            Ok(())
        }
    }
}
