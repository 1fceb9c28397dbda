use std::sync::Arc;

use anyhow::{Context, Result};

use price_watch::alert_sink::{AlertSink, LogAlertSink};
use price_watch::config::{Config, LogFormat};
use price_watch::quote::{CoinbaseQuoteClient, PriceSource};
use price_watch::runtime::{AlertEngine, EngineSettings};
use price_watch::store::{open_store, register_watches};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set PRICE_WATCH_CONFIG or create config/default.toml");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.as_str()));
    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
    }

    tracing::info!(
        asset_id = %config.engine.asset_id,
        quote_url = %config.quote.base_url,
        store = ?config.store.backend,
        "Starting price-watch"
    );

    let store = open_store(&config.store).await?;
    if config.store.reset_on_start {
        store
            .reset_watches()
            .await
            .context("failed to reset watch store")?;
        tracing::info!("Watch store reset");
    }
    let registered = register_watches(store.as_ref(), &config.watches).await?;
    tracing::info!(count = registered.len(), "Seed watches registered");

    let source: Arc<dyn PriceSource> = Arc::new(CoinbaseQuoteClient::new(
        &config.quote.base_url,
        config.quote.summary_ids.clone(),
        config.quote.timeout()?,
    )?);
    let sink: Arc<dyn AlertSink> = Arc::new(LogAlertSink);

    let settings = EngineSettings::from_config(&config)?;
    let engine = AlertEngine::spawn(settings, source, store, sink);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    tracing::info!("Ctrl+C received, shutting down");

    let summary = engine.shutdown().await?;
    for (kind, report) in &summary.workers {
        tracing::info!(
            strategy = %kind,
            ticks = report.ticks,
            skipped = report.skipped_ticks,
            sent = report.alerts_sent,
            suppressed = report.alerts_suppressed,
            dropped = report.alerts_dropped,
            "Worker summary"
        );
    }
    tracing::info!(
        delivered = summary.consumer.delivered,
        failed = summary.consumer.failed,
        "Shutdown complete"
    );
    Ok(())
}
