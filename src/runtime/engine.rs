use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::alert_sink::AlertSink;
use crate::config::Config;
use crate::model::alert::Alert;
use crate::poll_strategy::{PollStrategy, StrategyKind};
use crate::quote::PriceSource;
use crate::store::WatchStore;

use super::consumer::{run_alert_consumer, ConsumerReport};
use super::poll_worker::{PollWorker, WorkerReport};
use super::retrigger::RetriggerPolicy;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub asset_id: String,
    pub strategies: Vec<PollStrategy>,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub channel_capacity: usize,
    pub retrigger: RetriggerPolicy,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let engine = &config.engine;
        Ok(Self {
            asset_id: engine.asset_id.clone(),
            strategies: engine
                .enabled_strategies()
                .into_iter()
                .map(|kind| PollStrategy::from_kind(kind, engine.drift_factor))
                .collect(),
            poll_interval: engine
                .poll_interval()
                .context("engine.poll_interval is invalid")?,
            fetch_timeout: config.quote.timeout().context("quote.timeout is invalid")?,
            channel_capacity: engine.channel_capacity.max(1),
            retrigger: engine.retrigger,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSummary {
    pub workers: Vec<(StrategyKind, WorkerReport)>,
    pub consumer: ConsumerReport,
}

impl EngineSummary {
    pub fn alerts_sent(&self) -> u64 {
        self.workers.iter().map(|(_, r)| r.alerts_sent).sum()
    }
}

/// Wires poll workers and the alert consumer around one bounded channel.
pub struct AlertEngine;

impl AlertEngine {
    /// Spawn one task per strategy plus the consumer task.
    pub fn spawn(
        settings: EngineSettings,
        source: Arc<dyn PriceSource>,
        store: Arc<dyn WatchStore>,
        sink: Arc<dyn AlertSink>,
    ) -> EngineHandle {
        let (alert_tx, alert_rx) = mpsc::channel::<Alert>(settings.channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut workers = Vec::with_capacity(settings.strategies.len());
        for strategy in &settings.strategies {
            let worker = PollWorker::new(
                *strategy,
                settings.asset_id.clone(),
                Arc::clone(&source),
                Arc::clone(&store),
                alert_tx.clone(),
                settings.retrigger,
                settings.poll_interval,
                settings.fetch_timeout,
            );
            let handle = tokio::spawn(worker.run(shutdown_rx.clone()));
            workers.push((strategy.kind(), handle));
        }
        // Consumer ends once the last worker drops its sender.
        drop(alert_tx);

        let consumer = tokio::spawn(run_alert_consumer(alert_rx, sink));

        tracing::info!(
            asset_id = %settings.asset_id,
            workers = workers.len(),
            channel_capacity = settings.channel_capacity,
            "Alert engine started"
        );

        EngineHandle {
            shutdown_tx,
            workers,
            consumer,
        }
    }
}

pub struct EngineHandle {
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<(StrategyKind, JoinHandle<WorkerReport>)>,
    consumer: JoinHandle<ConsumerReport>,
}

impl EngineHandle {
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Signal cancellation, wait for every worker to finish its current
    /// tick, then wait for the consumer to drain the channel.
    pub async fn shutdown(self) -> Result<EngineSummary> {
        let _ = self.shutdown_tx.send(true);

        let mut workers = Vec::with_capacity(self.workers.len());
        for (kind, handle) in self.workers {
            let report = handle
                .await
                .with_context(|| format!("{} poll worker panicked", kind))?;
            workers.push((kind, report));
        }

        let consumer = self.consumer.await.context("alert consumer panicked")?;
        Ok(EngineSummary { workers, consumer })
    }
}
