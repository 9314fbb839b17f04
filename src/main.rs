// ABOUTME: CLI entry point for adsb-relay
// ABOUTME: Validates startup, connects the sink, then runs the relay until Ctrl+C or SIGTERM

use std::sync::Arc;
use std::time::Duration;

use adsb_relay::config::{AppConfig, Cli, SinkTarget};
use adsb_relay::relay::Relay;
use adsb_relay::sink::{EventSink, RabbitMqSink, StdoutSink};
use adsb_relay::utils::{retry_with_backoff, sanitize_url};
use anyhow::Context;
use clap::Parser;
use position_store::PositionStore;

const SINK_RETRIES: u32 = 3;
const SINK_RETRY_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // 1. RUST_LOG environment variable has highest precedence
    // 2. --log flag is used if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&cli.log_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config = AppConfig::try_from(cli).context("invalid configuration")?;

    let snapshot_path = &config.relay.snapshot_path;
    std::fs::metadata(snapshot_path).with_context(|| {
        format!(
            "failed to open aircraft file {}",
            snapshot_path.display()
        )
    })?;

    let sink: Arc<dyn EventSink> = match &config.sink {
        SinkTarget::DryRun => Arc::new(StdoutSink::new()),
        SinkTarget::RabbitMq(rabbit) => {
            tracing::info!(
                broker = %sanitize_url(&rabbit.broker_url),
                vhost = %rabbit.vhost,
                exchange = %rabbit.exchange,
                "connecting to broker"
            );
            Arc::new(RabbitMqSink::new(rabbit).context("failed to create broker client")?)
        }
    };

    let target = sink.as_ref();
    retry_with_backoff(move || target.prepare(), SINK_RETRIES, SINK_RETRY_DELAY)
        .await
        .with_context(|| format!("failed to initialise {}", sink.describe()))?;

    tracing::info!(
        aircraft = %snapshot_path.display(),
        station = %config.relay.station,
        monitor_freq = ?config.relay.ingest_interval,
        update_freq = ?config.relay.publish_interval,
        max_age = ?config.relay.max_age,
        sink = %sink.describe(),
        "adsb-relay starting"
    );

    let relay = Relay::builder()
        .config(config.relay.clone())
        .store(Arc::new(PositionStore::new()))
        .sink(sink)
        .build()?;

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let handle = relay.spawn(&shutdown_tx);

    wait_for_shutdown_signal().await?;
    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(());

    handle.join().await;
    tracing::info!("adsb-relay stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("failed to listen for SIGTERM")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for Ctrl+C"),
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")
}
