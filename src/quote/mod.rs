use anyhow::Result;
use async_trait::async_trait;

pub mod coinbase;
pub mod types;

pub use coinbase::CoinbaseQuoteClient;

/// Spot price lookup for a watched asset.
///
/// Calls may be slow or fail transiently; the poll worker bounds each call
/// with its own timeout.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn current_price(&self, asset_id: &str) -> Result<f64>;
}
