/// A standing interest in an asset's price reaching `threshold`.
///
/// `id` is the store's surrogate key; the engine identifies a watch by
/// [`WatchKey`] instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Watch {
    pub id: i64,
    pub asset_id: String,
    pub user_id: i64,
    pub threshold: f64,
}

/// Identity of a watch: `(asset_id, user_id, threshold)`.
///
/// The threshold is keyed by its bit pattern so the key can be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchKey {
    pub asset_id: String,
    pub user_id: i64,
    threshold_bits: u64,
}

impl WatchKey {
    pub fn threshold(&self) -> f64 {
        f64::from_bits(self.threshold_bits)
    }
}

impl Watch {
    pub fn key(&self) -> WatchKey {
        // -0.0 and 0.0 describe the same price level.
        let threshold = if self.threshold == 0.0 { 0.0 } else { self.threshold };
        WatchKey {
            asset_id: self.asset_id.clone(),
            user_id: self.user_id,
            threshold_bits: threshold.to_bits(),
        }
    }
}
