use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::WatchStore;
use crate::model::watch::Watch;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS asset_watches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    asset_id TEXT NOT NULL,
    threshold REAL NOT NULL,
    created_at_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS asset_watches_asset_threshold
    ON asset_watches(asset_id, threshold);
"#;

/// SQLite-backed store. Every call opens its own connection on a blocking
/// thread, so concurrent pollers never share a handle.
pub struct SqliteWatchStore {
    path: PathBuf,
}

impl SqliteWatchStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let schema_path = path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = schema_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let conn = connect(&schema_path)?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .context("sqlite schema task failed")??;
        Ok(Self { path })
    }
}

fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

fn insert_watch(path: &Path, asset_id: &str, user_id: i64, threshold: f64) -> Result<Watch> {
    let conn = connect(path)?;
    let now_ms = chrono::Utc::now().timestamp_millis();
    let watch = conn.query_row(
        r#"
        INSERT INTO asset_watches (user_id, asset_id, threshold, created_at_ms)
        VALUES (?1, ?2, ?3, ?4)
        RETURNING id, user_id, asset_id, threshold
        "#,
        params![user_id, asset_id, threshold, now_ms],
        |row| {
            Ok(Watch {
                id: row.get(0)?,
                user_id: row.get(1)?,
                asset_id: row.get(2)?,
                threshold: row.get(3)?,
            })
        },
    )?;
    Ok(watch)
}

fn select_range(path: &Path, asset_id: &str, low: f64, high: f64) -> Result<Vec<Watch>> {
    let conn = connect(path)?;
    let mut stmt = conn.prepare(
        r#"
        SELECT id, user_id, asset_id, threshold
        FROM asset_watches
        WHERE asset_id = ?1 AND threshold BETWEEN ?2 AND ?3
        ORDER BY threshold ASC, id ASC
        "#,
    )?;
    let rows = stmt.query_map(params![asset_id, low, high], |row| {
        Ok(Watch {
            id: row.get(0)?,
            user_id: row.get(1)?,
            asset_id: row.get(2)?,
            threshold: row.get(3)?,
        })
    })?;

    let mut watches = Vec::new();
    for row in rows {
        watches.push(row?);
    }
    Ok(watches)
}

#[async_trait]
impl WatchStore for SqliteWatchStore {
    async fn create_watch(&self, asset_id: &str, user_id: i64, threshold: f64) -> Result<Watch> {
        let path = self.path.clone();
        let asset_id = asset_id.to_string();
        tokio::task::spawn_blocking(move || insert_watch(&path, &asset_id, user_id, threshold))
            .await
            .context("sqlite insert task failed")?
    }

    async fn watches_in_range(&self, asset_id: &str, low: f64, high: f64) -> Result<Vec<Watch>> {
        let path = self.path.clone();
        let asset_id = asset_id.to_string();
        tokio::task::spawn_blocking(move || select_range(&path, &asset_id, low, high))
            .await
            .context("sqlite range task failed")?
    }

    async fn reset_watches(&self) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            connect(&path)?.execute("DELETE FROM asset_watches", [])?;
            Ok(())
        })
        .await
        .context("sqlite reset task failed")?
    }
}
