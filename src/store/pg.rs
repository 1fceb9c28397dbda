use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use postgres::{Client, NoTls, Row};
use tokio::task::JoinHandle;

use super::WatchStore;
use crate::error::AppError;
use crate::model::watch::Watch;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS asset_watches (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    asset_id TEXT NOT NULL,
    threshold DOUBLE PRECISION NOT NULL,
    created_at_ms BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS asset_watches_asset_threshold
    ON asset_watches(asset_id, threshold);
"#;

/// Postgres-backed store. The client is synchronous, so every call runs on a
/// blocking thread and takes the connection mutex for the duration of one
/// statement.
///
/// The client owns a private tokio runtime, which must not be dropped on an
/// async worker thread; see the `Drop` impl.
pub struct PostgresWatchStore {
    client: Option<Arc<Mutex<Client>>>,
}

impl PostgresWatchStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let url = database_url.to_string();
        let client = tokio::task::spawn_blocking(move || -> Result<Client> {
            let mut client = Client::connect(&url, NoTls).context("postgres connect failed")?;
            client
                .batch_execute(SCHEMA)
                .context("postgres schema setup failed")?;
            Ok(client)
        })
        .await
        .context("postgres connect task failed")??;
        Ok(Self {
            client: Some(Arc::new(Mutex::new(client))),
        })
    }

    async fn with_client<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Client) -> Result<T> + Send + 'static,
    {
        let client = self
            .client
            .clone()
            .ok_or_else(|| AppError::Store("postgres client already closed".to_string()))?;
        tokio::task::spawn_blocking(move || {
            let mut guard = client
                .lock()
                .map_err(|_| AppError::Store("postgres client lock poisoned".to_string()))?;
            op(&mut guard)
        })
        .await
        .context("postgres task failed")?
    }
}

impl Drop for PostgresWatchStore {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            drop_off_runtime(client);
        }
    }
}

/// Drop `value` on a blocking thread when called from inside a tokio runtime,
/// inline otherwise. Returns the join handle of the blocking drop, if any.
pub(crate) fn drop_off_runtime<T: Send + 'static>(value: T) -> Option<JoinHandle<()>> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(handle.spawn_blocking(move || drop(value))),
        Err(_) => {
            drop(value);
            None
        }
    }
}

fn watch_from_row(row: &Row) -> Result<Watch> {
    Ok(Watch {
        id: row.try_get(0)?,
        user_id: row.try_get(1)?,
        asset_id: row.try_get(2)?,
        threshold: row.try_get(3)?,
    })
}

#[async_trait]
impl WatchStore for PostgresWatchStore {
    async fn create_watch(&self, asset_id: &str, user_id: i64, threshold: f64) -> Result<Watch> {
        let asset_id = asset_id.to_string();
        self.with_client(move |client| {
            let now_ms = chrono::Utc::now().timestamp_millis();
            let row = client.query_one(
                r#"
                INSERT INTO asset_watches (user_id, asset_id, threshold, created_at_ms)
                VALUES ($1, $2, $3, $4)
                RETURNING id, user_id, asset_id, threshold
                "#,
                &[&user_id, &asset_id, &threshold, &now_ms],
            )?;
            watch_from_row(&row)
        })
        .await
    }

    async fn watches_in_range(&self, asset_id: &str, low: f64, high: f64) -> Result<Vec<Watch>> {
        let asset_id = asset_id.to_string();
        self.with_client(move |client| {
            let rows = client.query(
                r#"
                SELECT id, user_id, asset_id, threshold
                FROM asset_watches
                WHERE asset_id = $1 AND threshold BETWEEN $2 AND $3
                ORDER BY threshold ASC, id ASC
                "#,
                &[&asset_id, &low, &high],
            )?;
            rows.iter().map(watch_from_row).collect()
        })
        .await
    }

    async fn reset_watches(&self) -> Result<()> {
        self.with_client(|client| {
            client.execute("DELETE FROM asset_watches", &[])?;
            Ok(())
        })
        .await
    }
}
