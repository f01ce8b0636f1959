use std::sync::Arc;
use tracing::{debug, warn};

use super::{KeyValueStore, StorageError};
use crate::core::domain::WalletSession;

/// One provider's persisted session, stored as a JSON record under a fixed key.
#[derive(Clone)]
pub struct SessionVault {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SessionVault {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { store, key: key.into() }
    }

    /// A record that no longer parses is deleted and reported as absent.
    pub async fn load(&self) -> Result<Option<WalletSession>, StorageError> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<WalletSession>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding corrupt session record");
                self.store.delete(&self.key).await?;
                Ok(None)
            }
        }
    }

    pub async fn save(&self, session: &WalletSession) -> Result<(), StorageError> {
        let raw = serde_json::to_vec(session)?;
        self.store.set(&self.key, &raw).await?;
        debug!(key = %self.key, address = %session.short_address(), "session persisted");
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.delete(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::storage::MemoryKeyValueStore;

    #[tokio::test]
    async fn test_save_load_clear() {
        let store = MemoryKeyValueStore::new();
        let vault = SessionVault::new(Arc::new(store.clone()), "walletconnect_session");

        let mut session = WalletSession::new("topic", "0xabc", Network::Ethereum, "MetaMask");
        session.connected_at = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        vault.save(&session).await.unwrap();
        assert_eq!(vault.load().await.unwrap(), Some(session));

        vault.clear().await.unwrap();
        assert_eq!(vault.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_deleted() {
        let store = MemoryKeyValueStore::new();
        store.set("tronlink_session", b"not json").await.unwrap();
        let vault = SessionVault::new(Arc::new(store.clone()), "tronlink_session");

        assert_eq!(vault.load().await.unwrap(), None);
        assert!(!store.contains_key("tronlink_session").await);
    }
}
