//! Ingest Pipeline Binary
//!
//! Streams records from an external source into a remote append-only store.
//!
//! # Usage
//!
//! ```bash
//! # Poll the latest AAPL bar every 30s during market hours
//! cargo run -p ingest-pipeline -- --project acme --dataset prices --table bars_1m \
//!     bars --symbol AAPL --market-hours-only
//!
//! # Stream a subscription feed topic
//! cargo run -p ingest-pipeline -- --project acme --dataset social --table posts \
//!     feed --topic rust
//! ```
//!
//! # Environment Variables
//!
//! ## Feed mode
//! - `FEED_CLIENT_ID` / `FEED_CLIENT_SECRET`: feed credentials
//! - `INFLOW_FEED_URL`: feed WebSocket endpoint
//!
//! ## Optional
//! - `INFLOW_STORAGE_ENDPOINT`: StorageWrite gRPC endpoint (default: <http://localhost:50051>)
//! - `INFLOW_CHART_BASE_URL`: chart API host for bars mode
//! - `INFLOW_FETCH_DEADLINE_SECS` / `INFLOW_APPEND_DEADLINE_SECS`: call deadlines (default: unbounded)
//! - `INFLOW_RESTART_DELAY_INITIAL_MS`, `INFLOW_RESTART_DELAY_MAX_SECS`,
//!   `INFLOW_RESTART_MULTIPLIER`, `INFLOW_RESTART_JITTER`, `INFLOW_MAX_RESTARTS`:
//!   restart pacing (default: immediate, unbounded)
//! - `RUST_LOG`: log level (default: info)

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use ingest_pipeline::infrastructure::telemetry;
use ingest_pipeline::{
    BarPoller, BarPollerConfig, FeedSubscriber, FeedSubscriberConfig, Gate, IngestLoop,
    PipelineConfig, PipelineError, RemoteConfig, RemoteStorageWriter, SessionError, Supervisor,
    TablePath, TradingGate, init_metrics,
};

/// Stream source records into a remote append-only store.
#[derive(Debug, Parser)]
#[command(name = "ingest-pipeline", version)]
struct Cli {
    /// Project the destination table belongs to.
    #[arg(long)]
    project: String,

    /// Dataset the destination table belongs to.
    #[arg(long)]
    dataset: String,

    /// Destination table.
    #[arg(long)]
    table: String,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Poll the latest price bar of a symbol on an interval.
    Bars {
        /// Ticker symbol to stream.
        #[arg(long)]
        symbol: String,

        /// Only acquire data while the market is open.
        #[arg(long)]
        market_hours_only: bool,

        /// Seconds between polls.
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
    },
    /// Stream items from a subscription feed topic.
    Feed {
        /// Topic to subscribe to.
        #[arg(long)]
        topic: String,
    },
}

#[tokio::main]
#[allow(clippy::expect_used)]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();
    telemetry::init();
    let _metrics_handle = init_metrics();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("invalid environment configuration")?;

    let table = TablePath::new(cli.project, cli.dataset, cli.table);
    tracing::info!(
        table = %table.parent(),
        storage_endpoint = %config.endpoints.storage_endpoint,
        "starting ingest pipeline"
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        await_shutdown(signal_cancel).await;
    });

    let supervisor = Supervisor::new(config.restart.clone(), cancel.clone());
    let endpoints = config.endpoints.clone();
    let deadlines = config.deadlines;

    match cli.mode {
        Mode::Bars {
            symbol,
            market_hours_only,
            interval_secs,
        } => {
            let interval = Duration::from_secs(interval_secs);
            tracing::info!(
                symbol = %symbol,
                interval_secs,
                market_hours_only,
                "polling mode"
            );

            supervisor
                .run(move || {
                    let table = table.clone();
                    let cancel = cancel.clone();
                    let endpoints = endpoints.clone();
                    let symbol = symbol.clone();
                    async move {
                        let mut poller_config = BarPollerConfig::new(symbol);
                        poller_config.base_url = endpoints.chart_base_url;
                        let source = BarPoller::new(poller_config)?;

                        let writer =
                            RemoteStorageWriter::connect(RemoteConfig::new(endpoints.storage_endpoint))
                                .await
                                .map_err(|e| PipelineError::Session(SessionError::Open(e)))?;

                        let gate: Option<Box<dyn Gate + Send + Sync>> = market_hours_only
                            .then(|| {
                                Box::new(TradingGate::us_equities()) as Box<dyn Gate + Send + Sync>
                            });

                        IngestLoop::polling(source, table, interval, gate, cancel)
                            .with_deadlines(deadlines.fetch, deadlines.append)
                            .run(writer)
                            .await
                    }
                })
                .await?;
        }
        Mode::Feed { topic } => {
            let credentials = config
                .feed_credentials
                .clone()
                .context("FEED_CLIENT_ID and FEED_CLIENT_SECRET must be set for feed mode")?;
            let feed_url = endpoints
                .feed_url
                .clone()
                .context("INFLOW_FEED_URL must be set for feed mode")?;
            tracing::info!(topic = %topic, "subscription mode");

            supervisor
                .run(move || {
                    let table = table.clone();
                    let cancel = cancel.clone();
                    let storage_endpoint = endpoints.storage_endpoint.clone();
                    let subscriber_config = FeedSubscriberConfig {
                        url: feed_url.clone(),
                        topic: topic.clone(),
                        credentials: credentials.clone(),
                    };
                    async move {
                        let source = FeedSubscriber::connect(subscriber_config).await?;

                        let writer =
                            RemoteStorageWriter::connect(RemoteConfig::new(storage_endpoint))
                                .await
                                .map_err(|e| PipelineError::Session(SessionError::Open(e)))?;

                        IngestLoop::subscription(source, table, cancel)
                            .with_deadlines(deadlines.fetch, deadlines.append)
                            .run(writer)
                            .await
                    }
                })
                .await?;
        }
    }

    tracing::info!("ingest pipeline stopped");
    Ok(())
}

/// Load a `.env` file from the current directory or any ancestor.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel the pipeline.
#[allow(clippy::expect_used)]
async fn await_shutdown(cancel: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    cancel.cancel();
}
