use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::crossing::{triggered_watches, PriceInterval};
use crate::model::alert::Alert;
use crate::model::watch::WatchKey;
use crate::poll_strategy::PollStrategy;
use crate::quote::PriceSource;
use crate::store::WatchStore;

use super::retrigger::{NotificationLatch, RetriggerPolicy};

/// Counters a worker accumulates over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub alerts_sent: u64,
    pub alerts_dropped: u64,
    pub alerts_suppressed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Emitted { sent: usize, suppressed: usize },
    /// Fetch or store query failed; nothing was emitted.
    Skipped,
    /// The consumer is gone; pending alerts were dropped.
    ChannelClosed { dropped: usize },
}

/// Runs one polling strategy: sample, detect, emit, wait.
pub struct PollWorker {
    strategy: PollStrategy,
    asset_id: String,
    source: Arc<dyn PriceSource>,
    store: Arc<dyn WatchStore>,
    alert_tx: mpsc::Sender<Alert>,
    latch: NotificationLatch,
    poll_interval: Duration,
    fetch_timeout: Duration,
    report: WorkerReport,
}

impl PollWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strategy: PollStrategy,
        asset_id: impl Into<String>,
        source: Arc<dyn PriceSource>,
        store: Arc<dyn WatchStore>,
        alert_tx: mpsc::Sender<Alert>,
        retrigger: RetriggerPolicy,
        poll_interval: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            strategy,
            asset_id: asset_id.into(),
            source,
            store,
            alert_tx,
            latch: NotificationLatch::new(retrigger),
            poll_interval,
            fetch_timeout,
            report: WorkerReport::default(),
        }
    }

    pub fn report(&self) -> WorkerReport {
        self.report
    }

    /// Run one full tick. Per-tick failures are logged and reported as
    /// [`TickOutcome::Skipped`]; they never end the worker.
    pub async fn tick(&mut self) -> TickOutcome {
        self.report.ticks += 1;
        let strategy = self.strategy.label();

        let pair = match self
            .strategy
            .sample(self.source.as_ref(), &self.asset_id, self.fetch_timeout)
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                self.report.skipped_ticks += 1;
                tracing::warn!(
                    strategy,
                    asset_id = %self.asset_id,
                    error = %format!("{:#}", e),
                    "Price fetch failed, skipping tick"
                );
                return TickOutcome::Skipped;
            }
        };

        let interval = PriceInterval::from_pair(pair);
        let watches = match triggered_watches(self.store.as_ref(), &self.asset_id, interval).await
        {
            Ok(watches) => watches,
            Err(e) => {
                self.report.skipped_ticks += 1;
                tracing::warn!(
                    strategy,
                    asset_id = %self.asset_id,
                    low = interval.low(),
                    high = interval.high(),
                    error = %format!("{:#}", e),
                    "Watch range query failed, skipping tick"
                );
                return TickOutcome::Skipped;
            }
        };

        tracing::debug!(
            strategy,
            asset_id = %self.asset_id,
            prior = pair.prior,
            current = pair.current,
            low = interval.low(),
            high = interval.high(),
            activated = watches.len(),
            "Crossing interval evaluated"
        );

        let admission = self.latch.admit(watches, pair.current);
        self.report.alerts_suppressed += admission.suppressed as u64;
        if admission.rearmed > 0 {
            tracing::debug!(
                strategy,
                rearmed = admission.rearmed,
                current = pair.current,
                "Watches re-armed"
            );
        }

        let mut sent = 0usize;
        let mut dropped = 0usize;
        for watch in admission.fire {
            let alert = Alert::for_watch(&watch);
            if dropped > 0 {
                self.drop_alert(&watch.key(), &alert);
                dropped += 1;
                continue;
            }
            if let Err(mpsc::error::SendError(alert)) = self.alert_tx.send(alert).await {
                self.drop_alert(&watch.key(), &alert);
                dropped += 1;
                continue;
            }
            sent += 1;
            self.report.alerts_sent += 1;
        }

        if dropped > 0 {
            TickOutcome::ChannelClosed { dropped }
        } else {
            TickOutcome::Emitted {
                sent,
                suppressed: admission.suppressed,
            }
        }
    }

    fn drop_alert(&mut self, key: &WatchKey, alert: &Alert) {
        self.latch.release(key);
        self.report.alerts_dropped += 1;
        tracing::warn!(
            strategy = self.strategy.label(),
            user_id = alert.user_id,
            message = %alert.message,
            "Alert channel closed, alert dropped"
        );
    }

    /// Tick until `shutdown` flips to true (or its sender is dropped).
    ///
    /// The flag is checked between ticks and during the inter-tick sleep; a
    /// tick in progress always runs to completion.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> WorkerReport {
        let strategy = self.strategy.label();
        tracing::info!(
            strategy,
            asset_id = %self.asset_id,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            retrigger = ?self.latch.policy(),
            "Poll worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let TickOutcome::ChannelClosed { dropped } = self.tick().await {
                tracing::warn!(strategy, dropped, "Alert consumer stopped, poll worker exiting");
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            strategy,
            ticks = self.report.ticks,
            skipped = self.report.skipped_ticks,
            sent = self.report.alerts_sent,
            dropped = self.report.alerts_dropped,
            suppressed = self.report.alerts_suppressed,
            "Poll worker stopped"
        );
        self.report
    }
}
