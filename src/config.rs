use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;
use crate::poll_strategy::StrategyKind;
use crate::runtime::retrigger::RetriggerPolicy;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub quote: QuoteConfig,
    pub engine: EngineConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub watches: Vec<WatchSeed>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteConfig {
    pub base_url: String,
    #[serde(default = "default_fetch_timeout")]
    pub timeout: String,
    /// Maps a watched asset id (e.g. "bitcoin") to the quote source's summary id.
    #[serde(default)]
    pub summary_ids: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub asset_id: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    pub strategies: Vec<StrategyKind>,
    #[serde(default = "default_drift_factor")]
    pub drift_factor: f64,
    #[serde(default)]
    pub retrigger: RetriggerPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default)]
    pub reset_on_start: bool,
    #[serde(skip)]
    pub database_url: String,
}

/// A watch registered at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WatchSeed {
    pub asset_id: String,
    pub user_id: i64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_fetch_timeout() -> String {
    "5s".to_string()
}

fn default_poll_interval() -> String {
    "3s".to_string()
}

fn default_channel_capacity() -> usize {
    64
}

fn default_drift_factor() -> f64 {
    0.15
}

fn default_sqlite_path() -> String {
    "data/price_watch.sqlite".to_string()
}

/// Parse an interval string (e.g. "250ms", "3s", "1m", "1h", "1d", "1w", "1M") into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    let s = s.trim();
    let (num_str, unit_ms) = if let Some(num) = s.strip_suffix("ms") {
        (num, 1)
    } else {
        if s.len() < 2 {
            bail!("invalid interval '{}': expected format like '3s'", s);
        }
        let (num, suffix) = s.split_at(s.len() - 1);
        let unit_ms = match suffix {
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            "w" => 7 * 86_400_000,
            "M" => 30 * 86_400_000,
            _ => bail!(
                "invalid interval '{}': unsupported suffix '{}', expected one of ms/s/m/h/d/w/M",
                s,
                suffix
            ),
        };
        (num, unit_ms)
    };

    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

impl QuoteConfig {
    pub fn timeout(&self) -> Result<Duration> {
        parse_interval_ms(&self.timeout).map(Duration::from_millis)
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Result<Duration> {
        parse_interval_ms(&self.poll_interval).map(Duration::from_millis)
    }

    /// Configured strategies in declaration order, duplicates removed.
    pub fn enabled_strategies(&self) -> Vec<StrategyKind> {
        let mut out = Vec::new();
        for kind in &self.strategies {
            if !out.contains(kind) {
                out.push(*kind);
            }
        }
        out
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("PRICE_WATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        if config.store.backend == StoreBackend::Postgres {
            config.store.database_url = std::env::var("PRICE_WATCH_DATABASE_URL")
                .context("PRICE_WATCH_DATABASE_URL not set in .env or environment")?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.quote.base_url).map_err(|e| {
            config_error(format!(
                "quote.base_url '{}' is not a URL: {}",
                self.quote.base_url, e
            ))
        })?;
        self.quote.timeout().context("quote.timeout is invalid")?;
        self.engine
            .poll_interval()
            .context("engine.poll_interval is invalid")?;

        if self.engine.asset_id.trim().is_empty() {
            return Err(config_error("engine.asset_id must not be empty"));
        }
        if !self.quote.summary_ids.contains_key(&self.engine.asset_id) {
            return Err(config_error(format!(
                "quote.summary_ids has no entry for engine asset '{}'",
                self.engine.asset_id
            )));
        }
        if self.engine.strategies.is_empty() {
            return Err(config_error(
                "engine.strategies must name at least one strategy",
            ));
        }
        if self.engine.channel_capacity == 0 {
            return Err(config_error("engine.channel_capacity must be > 0"));
        }
        if !self.engine.drift_factor.is_finite() || self.engine.drift_factor <= -1.0 {
            return Err(config_error(format!(
                "engine.drift_factor {} must be finite and greater than -1",
                self.engine.drift_factor
            )));
        }
        for seed in &self.watches {
            if !seed.threshold.is_finite() {
                return Err(config_error(format!(
                    "watch for asset '{}' user {} has a non-finite threshold",
                    seed.asset_id, seed.user_id
                )));
            }
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> anyhow::Error {
    AppError::Config(message.into()).into()
}
