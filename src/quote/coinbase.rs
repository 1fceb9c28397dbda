use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::AppError;

use super::types::{AssetSummary, AssetSummaryResponse};
use super::PriceSource;

/// Client for the asset summary endpoint. Responses are gzip-decoded
/// transparently when the server sets `Content-Encoding: gzip`.
pub struct CoinbaseQuoteClient {
    http: reqwest::Client,
    base_url: String,
    summary_ids: HashMap<String, String>,
}

impl CoinbaseQuoteClient {
    pub fn new(
        base_url: &str,
        summary_ids: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        url::Url::parse(base_url)
            .with_context(|| format!("invalid quote base url '{}'", base_url))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .context("failed to build quote HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            summary_ids,
        })
    }

    fn summary_url(&self, summary_id: &str) -> String {
        format!("{}/v2/assets/summary/{}", self.base_url, summary_id)
    }

    pub async fn asset_summary(&self, asset_id: &str) -> Result<AssetSummary> {
        let summary_id = self
            .summary_ids
            .get(asset_id)
            .ok_or_else(|| AppError::UnknownAsset(asset_id.to_string()))?;
        let url = self.summary_url(summary_id);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(AppError::Http)
            .with_context(|| format!("asset summary request failed for {}", asset_id))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::QuoteStatus {
                url,
                status: status.as_u16(),
            }
            .into());
        }

        let body = resp.bytes().await.map_err(AppError::Http)?;
        let payload: AssetSummaryResponse = serde_json::from_slice(&body)
            .map_err(|e| AppError::QuoteDecode(format!("{}: {}", url, e)))?;
        Ok(payload.data)
    }
}

#[async_trait]
impl PriceSource for CoinbaseQuoteClient {
    async fn current_price(&self, asset_id: &str) -> Result<f64> {
        let summary = self.asset_summary(asset_id).await?;
        let latest = summary.latest;
        if !latest.is_finite() {
            return Err(AppError::NonFinitePrice {
                asset_id: asset_id.to_string(),
                value: latest,
            }
            .into());
        }
        if latest <= 0.0 {
            return Err(AppError::QuoteDecode(format!(
                "non-positive latest price {} for {}",
                latest, asset_id
            ))
            .into());
        }
        tracing::trace!(
            asset_id,
            base = %summary.base,
            currency = %summary.currency,
            price = latest,
            "Spot price fetched"
        );
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> CoinbaseQuoteClient {
        let mut ids = HashMap::new();
        ids.insert(
            "bitcoin".to_string(),
            "7b11fea3-4784-54a7-bc33-280c38fff18e".to_string(),
        );
        CoinbaseQuoteClient::new(base, ids, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn summary_url_strips_trailing_slash() {
        let c = client("https://api.coinbase.com/");
        assert_eq!(
            c.summary_url("abc"),
            "https://api.coinbase.com/v2/assets/summary/abc"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(CoinbaseQuoteClient::new("not a url", HashMap::new(), Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn unknown_asset_is_an_error() {
        let c = client("http://127.0.0.1:9");
        let err = c.current_price("dogecoin").await.unwrap_err();
        assert!(err.to_string().contains("dogecoin"));
    }
}
