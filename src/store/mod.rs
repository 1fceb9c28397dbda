use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::{StoreBackend, StoreConfig, WatchSeed};
use crate::model::watch::Watch;

pub mod memory;
pub mod pg;
pub mod sqlite;

pub use memory::InMemoryWatchStore;
pub use pg::PostgresWatchStore;
pub use sqlite::SqliteWatchStore;

/// Repository of registered watches.
///
/// Implementations own their concurrency control; pollers call
/// `watches_in_range` concurrently without engine-side locking.
#[async_trait]
pub trait WatchStore: Send + Sync {
    async fn create_watch(&self, asset_id: &str, user_id: i64, threshold: f64) -> Result<Watch>;

    /// Watches on `asset_id` with `low <= threshold <= high`.
    async fn watches_in_range(&self, asset_id: &str, low: f64, high: f64) -> Result<Vec<Watch>>;

    /// Remove every registered watch.
    async fn reset_watches(&self) -> Result<()>;
}

pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn WatchStore>> {
    let store: Arc<dyn WatchStore> = match config.backend {
        StoreBackend::Sqlite => Arc::new(
            SqliteWatchStore::open(&config.sqlite_path)
                .await
                .with_context(|| format!("failed to open sqlite store {}", config.sqlite_path))?,
        ),
        StoreBackend::Postgres => Arc::new(
            PostgresWatchStore::connect(&config.database_url)
                .await
                .context("failed to connect postgres store")?,
        ),
        StoreBackend::Memory => Arc::new(InMemoryWatchStore::default()),
    };
    Ok(store)
}

/// Create every seed watch. The first failed write aborts registration.
pub async fn register_watches(store: &dyn WatchStore, seeds: &[WatchSeed]) -> Result<Vec<Watch>> {
    let mut created = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let watch = store
            .create_watch(&seed.asset_id, seed.user_id, seed.threshold)
            .await
            .with_context(|| {
                format!(
                    "failed to register watch asset={} user={} threshold={}",
                    seed.asset_id, seed.user_id, seed.threshold
                )
            })?;
        tracing::debug!(
            id = watch.id,
            asset_id = %watch.asset_id,
            user_id = watch.user_id,
            threshold = watch.threshold,
            "Watch registered"
        );
        created.push(watch);
    }
    Ok(created)
}
