//! SQLite-backed key-value store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::{KeyValueStore, StorageError};

#[derive(Debug, Clone)]
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
    is_memory: bool,
}

impl SqliteKeyValueStore {
    pub async fn new_with_url(database_url: &str) -> Result<Self, StorageError> {
        // accept "sqlite:" as well as "sqlite://"
        let mut db_url = database_url.to_string();
        if db_url.starts_with("sqlite:") && !db_url.starts_with("sqlite://") {
            db_url = db_url.replacen("sqlite:", "sqlite://", 1);
        }
        let is_memory = db_url.contains(":memory:");

        if !is_memory {
            if let Some(path) = db_url.strip_prefix("sqlite://") {
                let path_only = path.split('?').next().unwrap_or_default();
                if let Some(parent) = std::path::Path::new(path_only).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| StorageError::Backend(format!("create {}: {}", parent.display(), e)))?;
                    }
                }
            }
        }

        let mut options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);
        if !is_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        // an in-memory database lives and dies with its single connection
        let max_connections = if is_memory { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let store = Self { pool, is_memory };
        store.initialize_schema().await?;
        info!(in_memory = is_memory, "[storage] kv store ready");
        Ok(store)
    }

    pub fn is_in_memory(&self) -> bool {
        self.is_memory
    }

    async fn initialize_schema(&self) -> Result<(), StorageError> {
        debug!("Initializing kv_store schema");
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<Vec<u8>, _>("value")))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        debug!(key, "kv entry stored");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1").bind(key).execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_roundtrip() {
        let store = SqliteKeyValueStore::new_with_url("sqlite::memory:").await.unwrap();
        assert!(store.is_in_memory());
        assert_eq!(store.get("session").await.unwrap(), None);

        store.set("session", b"{}").await.unwrap();
        store.set("session", b"{\"id\":1}").await.unwrap();
        assert_eq!(store.get("session").await.unwrap(), Some(b"{\"id\":1}".to_vec()));

        store.delete("session").await.unwrap();
        assert_eq!(store.get("session").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/nested/kv.db?mode=rwc", dir.path().display());

        let store = SqliteKeyValueStore::new_with_url(&url).await.unwrap();
        store.set("k", b"v").await.unwrap();
        drop(store);

        let reopened = SqliteKeyValueStore::new_with_url(&url).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap(), Some(b"v".to_vec()));
    }
}
