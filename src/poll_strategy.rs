use anyhow::Result;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::error::AppError;
use crate::model::price::PricePair;
use crate::quote::PriceSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Percent,
    Threshold,
}

impl StrategyKind {
    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::Percent => "percent",
            StrategyKind::Threshold => "threshold",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a poll worker derives the `prior` sample for each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollStrategy {
    /// One fetch; `prior = current / (1 + drift_factor)`.
    ///
    /// This is a synthetic floor computed from the same fetch, not a
    /// time-lagged sample. With the default drift of 0.15 every tick sweeps
    /// the band roughly 13% below the spot price.
    Percent { drift_factor: f64 },
    /// Two back-to-back fetches, `current` first. Both are treated as
    /// simultaneous; the swept interval is usually very narrow.
    Threshold,
}

impl PollStrategy {
    pub fn from_kind(kind: StrategyKind, drift_factor: f64) -> Self {
        match kind {
            StrategyKind::Percent => PollStrategy::Percent { drift_factor },
            StrategyKind::Threshold => PollStrategy::Threshold,
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            PollStrategy::Percent { .. } => StrategyKind::Percent,
            PollStrategy::Threshold => StrategyKind::Threshold,
        }
    }

    pub fn label(&self) -> &'static str {
        self.kind().label()
    }

    /// Fetch the price sample(s) for one tick. Each fetch is bounded by
    /// `fetch_timeout`.
    pub async fn sample(
        &self,
        source: &dyn PriceSource,
        asset_id: &str,
        fetch_timeout: Duration,
    ) -> Result<PricePair> {
        match *self {
            PollStrategy::Percent { drift_factor } => {
                let current = fetch_price(source, asset_id, fetch_timeout).await?;
                Ok(PricePair::new(percent_floor(current, drift_factor), current))
            }
            PollStrategy::Threshold => {
                let current = fetch_price(source, asset_id, fetch_timeout).await?;
                let prior = fetch_price(source, asset_id, fetch_timeout).await?;
                Ok(PricePair::new(prior, current))
            }
        }
    }
}

pub fn percent_floor(current: f64, drift_factor: f64) -> f64 {
    current / (1.0 + drift_factor)
}

async fn fetch_price(source: &dyn PriceSource, asset_id: &str, timeout: Duration) -> Result<f64> {
    let price = match tokio::time::timeout(timeout, source.current_price(asset_id)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(AppError::FetchTimeout {
                asset_id: asset_id.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }
            .into())
        }
    };
    if !price.is_finite() {
        return Err(AppError::NonFinitePrice {
            asset_id: asset_id.to_string(),
            value: price,
        }
        .into());
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_floor_uses_drift() {
        assert!((percent_floor(115.0, 0.15) - 100.0).abs() < 1e-9);
        assert_eq!(percent_floor(50.0, 0.0), 50.0);
    }

    #[test]
    fn kind_round_trips_through_strategy() {
        for kind in [StrategyKind::Percent, StrategyKind::Threshold] {
            assert_eq!(PollStrategy::from_kind(kind, 0.15).kind(), kind);
        }
        assert_eq!(PollStrategy::Threshold.label(), "threshold");
    }
}
