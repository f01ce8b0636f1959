//! 会话持久化
//!
//! A small async key-value seam plus the session record stored through it. Each provider
//! owns one [`SessionVault`] under its own key.

use async_trait::async_trait;
use thiserror::Error;

mod memory;
mod sqlite;
mod vault;

pub use memory::MemoryKeyValueStore;
pub use sqlite::SqliteKeyValueStore;
pub use vault::SessionVault;

/// Persistence errors. Providers log these and carry on.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Byte-blob store keyed by string, e.g. the platform's encrypted preferences.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}
