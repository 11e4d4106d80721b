use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use guildpulse_common::{load_config, Config, FileConfig};
use guildpulse_engine::{Dispatcher, MetricRequest, RetryPolicy, TimeWindow};
use guildpulse_events::{EventStore, PoolSettings};

mod output;

#[derive(Parser)]
#[command(name = "guildpulse")]
#[command(about = "Guild activity series from the action log")]
#[command(version)]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, global = true, env = "GUILDPULSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print one metric series as JSON
    Query {
        /// Guild id to report on
        #[arg(long)]
        guild: String,

        /// numusers, numjoined, numleft or nummessages
        #[arg(long)]
        metric: String,

        /// Window start (RFC 3339). Defaults to 24 hours before --to.
        #[arg(long)]
        from: Option<DateTime<Utc>>,

        /// Window end (RFC 3339). Defaults to now.
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },

    /// Answer a JSON array of dashboard requests, one response per refId
    Batch {
        #[arg(long)]
        file: PathBuf,
    },

    /// Check that the event store is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("guildpulse=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    let config = Config::from_env(file)?;
    config.log_redacted();

    let dispatcher = build_dispatcher(&config).await?;
    let cancel = cancel_on_ctrl_c();

    match cli.command {
        Command::Query {
            guild,
            metric,
            from,
            to,
        } => {
            let to = to.unwrap_or_else(Utc::now);
            let from = from.unwrap_or(to - Duration::hours(24));
            let series = dispatcher
                .dispatch_token(&metric, &guild, TimeWindow::new(from, to), &cancel)
                .await?;
            println!("{}", serde_json::to_string_pretty(&series)?);
        }
        Command::Batch { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read request file: {}", file.display()))?;
            let requests: Vec<MetricRequest> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse request file: {}", file.display()))?;

            info!(requests = requests.len(), "Dispatching batch");
            let responses = dispatcher.dispatch_all(requests, &cancel).await;
            println!("{}", serde_json::to_string_pretty(&output::batch_json(&responses))?);
        }
        Command::Health => {
            let status = dispatcher.check_health().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            anyhow::ensure!(status.ok, "{}", status.message);
        }
    }

    Ok(())
}

async fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let settings = PoolSettings {
        max_connections: config.database.max_connections,
        acquire_timeout: config.acquire_timeout(),
        eager: false,
    };
    let store = EventStore::connect(config.connect_options()?, &settings).await?;

    let mut dispatcher = Dispatcher::new(Arc::new(store)).with_retry(RetryPolicy {
        max_retries: config.dispatch.max_retries,
        backoff: config.retry_backoff(),
    });
    if let Some(timeout) = config.query_timeout() {
        dispatcher = dispatcher.with_query_timeout(timeout);
    }
    Ok(dispatcher)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight queries");
            trigger.cancel();
        }
    });
    cancel
}
