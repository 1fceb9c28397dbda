use std::time::Duration;

use price_watch::config::{parse_interval_ms, Config, LogFormat, StoreBackend};
use price_watch::error::AppError;
use price_watch::poll_strategy::{PollStrategy, StrategyKind};
use price_watch::runtime::{EngineSettings, RetriggerPolicy};

const FULL_TOML: &str = r#"
[quote]
base_url = "https://api.coinbase.com"
timeout = "5s"

[quote.summary_ids]
bitcoin = "7b11fea3-4784-54a7-bc33-280c38fff18e"

[engine]
asset_id = "bitcoin"
poll_interval = "3s"
channel_capacity = 64
strategies = ["percent", "threshold"]
drift_factor = 0.15
retrigger = "level"

[store]
backend = "postgres"
reset_on_start = true

[[watches]]
asset_id = "bitcoin"
user_id = 1
threshold = 110.0

[[watches]]
asset_id = "bitcoin"
user_id = 2
threshold = 16.0

[logging]
level = "debug"
format = "json"
"#;

const MINIMAL_TOML: &str = r#"
[quote]
base_url = "https://api.coinbase.com"

[quote.summary_ids]
bitcoin = "abc"

[engine]
asset_id = "bitcoin"
strategies = ["percent"]

[store]
backend = "memory"

[logging]
level = "info"
"#;

#[test]
fn parse_full_toml() {
    let config: Config = toml::from_str(FULL_TOML).unwrap();
    assert_eq!(config.engine.asset_id, "bitcoin");
    assert_eq!(
        config.engine.strategies,
        vec![StrategyKind::Percent, StrategyKind::Threshold]
    );
    assert_eq!(config.engine.retrigger, RetriggerPolicy::Level);
    assert_eq!(config.engine.channel_capacity, 64);
    assert!((config.engine.drift_factor - 0.15).abs() < f64::EPSILON);
    assert_eq!(config.store.backend, StoreBackend::Postgres);
    assert!(config.store.reset_on_start);
    assert!(config.store.database_url.is_empty());
    assert_eq!(config.watches.len(), 2);
    assert_eq!(config.watches[1].user_id, 2);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
    config.validate().expect("full config should validate");
}

#[test]
/// Omitted engine knobs fall back to the legacy defaults: 3s polling, 5s
/// fetch timeout, 64-slot channel, 15% drift, edge-triggered alerts.
fn minimal_toml_uses_defaults() {
    let config: Config = toml::from_str(MINIMAL_TOML).unwrap();
    assert_eq!(config.engine.poll_interval().unwrap(), Duration::from_secs(3));
    assert_eq!(config.quote.timeout().unwrap(), Duration::from_secs(5));
    assert_eq!(config.engine.channel_capacity, 64);
    assert!((config.engine.drift_factor - 0.15).abs() < f64::EPSILON);
    assert_eq!(config.engine.retrigger, RetriggerPolicy::Edge);
    assert_eq!(config.store.sqlite_path, "data/price_watch.sqlite");
    assert!(!config.store.reset_on_start);
    assert!(config.watches.is_empty());
    assert_eq!(config.logging.format, LogFormat::Text);
}

#[test]
fn engine_settings_follow_config() {
    let config: Config = toml::from_str(FULL_TOML).unwrap();
    let settings = EngineSettings::from_config(&config).unwrap();
    assert_eq!(settings.asset_id, "bitcoin");
    assert_eq!(
        settings.strategies,
        vec![
            PollStrategy::Percent { drift_factor: 0.15 },
            PollStrategy::Threshold
        ]
    );
    assert_eq!(settings.poll_interval, Duration::from_secs(3));
    assert_eq!(settings.fetch_timeout, Duration::from_secs(5));
    assert_eq!(settings.retrigger, RetriggerPolicy::Level);
}

#[test]
fn validate_rejects_missing_summary_id() {
    let mut config: Config = toml::from_str(MINIMAL_TOML).unwrap();
    config.engine.asset_id = "ethereum".to_string();
    let err = config.validate().unwrap_err();
    assert!(format!("{:#}", err).contains("ethereum"));
    assert!(matches!(
        err.downcast_ref::<AppError>(),
        Some(AppError::Config(_))
    ));
}

#[test]
fn validate_rejects_bad_engine_values() {
    let base: Config = toml::from_str(MINIMAL_TOML).unwrap();

    let mut cfg = base.clone();
    cfg.engine.strategies.clear();
    assert!(cfg.validate().is_err());

    let mut cfg = base.clone();
    cfg.engine.channel_capacity = 0;
    let err = cfg.validate().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AppError>(),
        Some(AppError::Config(msg)) if msg.contains("channel_capacity")
    ));

    let mut cfg = base.clone();
    cfg.engine.drift_factor = -1.0;
    assert!(cfg.validate().is_err());

    let mut cfg = base.clone();
    cfg.engine.drift_factor = f64::NAN;
    assert!(cfg.validate().is_err());

    let mut cfg = base.clone();
    cfg.engine.poll_interval = "soon".to_string();
    assert!(cfg.validate().is_err());

    let mut cfg = base;
    cfg.quote.base_url = "not a url".to_string();
    assert!(cfg.validate().is_err());
}

#[test]
fn unknown_strategy_name_fails_to_parse() {
    let toml_str = MINIMAL_TOML.replace("[\"percent\"]", "[\"momentum\"]");
    assert!(toml::from_str::<Config>(&toml_str).is_err());
}

#[test]
fn parse_interval_valid() {
    assert_eq!(parse_interval_ms("3s").unwrap(), 3_000);
    assert_eq!(parse_interval_ms("50ms").unwrap(), 50);
    assert_eq!(parse_interval_ms("1m").unwrap(), 60_000);
}

#[test]
fn parse_interval_rejects_invalid_inputs() {
    assert!(parse_interval_ms("").is_err());
    assert!(parse_interval_ms("m").is_err());
    assert!(parse_interval_ms("0m").is_err());
    assert!(parse_interval_ms("1x").is_err());
    assert!(parse_interval_ms("-1s").is_err());
}
