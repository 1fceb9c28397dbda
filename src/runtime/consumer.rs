use std::sync::Arc;

use tokio::sync::mpsc;

use crate::alert_sink::AlertSink;
use crate::model::alert::Alert;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub delivered: u64,
    pub failed: u64,
}

/// Drain `alert_rx` into `sink` in arrival order.
///
/// Returns once every sender is dropped and the buffer is empty, so alerts
/// queued before shutdown are still delivered.
pub async fn run_alert_consumer(
    mut alert_rx: mpsc::Receiver<Alert>,
    sink: Arc<dyn AlertSink>,
) -> ConsumerReport {
    let mut report = ConsumerReport::default();
    while let Some(alert) = alert_rx.recv().await {
        match sink.deliver(&alert) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    user_id = alert.user_id,
                    message = %alert.message,
                    error = %format!("{:#}", e),
                    "Alert sink failed, alert dropped"
                );
            }
        }
    }
    tracing::info!(
        delivered = report.delivered,
        failed = report.failed,
        "Alert consumer drained"
    );
    report
}
