use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::WatchStore;
use crate::error::AppError;
use crate::model::watch::Watch;

/// Process-local store, used for dry runs and tests.
#[derive(Default)]
pub struct InMemoryWatchStore {
    watches: RwLock<Vec<Watch>>,
    next_id: AtomicI64,
}

impl InMemoryWatchStore {
    pub fn len(&self) -> usize {
        self.watches.read().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> AppError {
    AppError::Store("in-memory watch store lock poisoned".to_string())
}

#[async_trait]
impl WatchStore for InMemoryWatchStore {
    async fn create_watch(&self, asset_id: &str, user_id: i64, threshold: f64) -> Result<Watch> {
        let watch = Watch {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            asset_id: asset_id.to_string(),
            user_id,
            threshold,
        };
        self.watches.write().map_err(|_| poisoned())?.push(watch.clone());
        Ok(watch)
    }

    async fn watches_in_range(&self, asset_id: &str, low: f64, high: f64) -> Result<Vec<Watch>> {
        let watches = self.watches.read().map_err(|_| poisoned())?;
        Ok(watches
            .iter()
            .filter(|w| w.asset_id == asset_id && low <= w.threshold && w.threshold <= high)
            .cloned()
            .collect())
    }

    async fn reset_watches(&self) -> Result<()> {
        self.watches.write().map_err(|_| poisoned())?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn range_is_inclusive_and_scoped_to_asset() {
        let store = InMemoryWatchStore::default();
        for t in [90.0, 100.0, 110.0, 120.0, 130.0] {
            store.create_watch("bitcoin", 1, t).await.unwrap();
        }
        store.create_watch("ethereum", 1, 110.0).await.unwrap();

        let hits = store.watches_in_range("bitcoin", 100.0, 120.0).await.unwrap();
        let thresholds: Vec<f64> = hits.iter().map(|w| w.threshold).collect();
        assert_eq!(thresholds, vec![100.0, 110.0, 120.0]);
    }

    #[tokio::test]
    async fn ids_are_assigned_and_reset_clears() {
        let store = InMemoryWatchStore::default();
        let a = store.create_watch("bitcoin", 1, 1.0).await.unwrap();
        let b = store.create_watch("bitcoin", 2, 2.0).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.len(), 2);

        store.reset_watches().await.unwrap();
        assert!(store.is_empty());
    }
}
