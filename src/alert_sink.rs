use anyhow::Result;

use crate::model::alert::Alert;

/// Downstream target for delivered alerts (log, push, mail...).
pub trait AlertSink: Send + Sync {
    fn deliver(&self, alert: &Alert) -> Result<()>;
}

/// Writes each alert as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn deliver(&self, alert: &Alert) -> Result<()> {
        tracing::info!(
            user_id = alert.user_id,
            message = %alert.message,
            "New alert triggered"
        );
        Ok(())
    }
}
