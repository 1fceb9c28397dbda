use anyhow::Result;

use crate::model::price::PricePair;
use crate::model::watch::Watch;
use crate::store::WatchStore;

/// Closed interval `[low, high]` with `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceInterval {
    low: f64,
    high: f64,
}

impl PriceInterval {
    /// Interval spanned by two samples, ordered regardless of direction.
    pub fn spanning(prior: f64, current: f64) -> Self {
        Self {
            low: prior.min(current),
            high: prior.max(current),
        }
    }

    pub fn from_pair(pair: PricePair) -> Self {
        Self::spanning(pair.prior, pair.current)
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn contains(&self, price: f64) -> bool {
        self.low <= price && price <= self.high
    }
}

/// Watches on `asset_id` whose threshold lies inside the swept interval.
pub async fn triggered_watches(
    store: &dyn WatchStore,
    asset_id: &str,
    interval: PriceInterval,
) -> Result<Vec<Watch>> {
    let watches = store
        .watches_in_range(asset_id, interval.low(), interval.high())
        .await?;
    // Range and asset filters are re-applied to whatever the store returns.
    Ok(watches
        .into_iter()
        .filter(|w| w.asset_id == asset_id && interval.contains(w.threshold))
        .collect())
}
