// tests/util.rs
// Shared harness for integration tests: a manager over recording seams.

use std::sync::Arc;

use usdt_wallet_link::core::config::WalletLinkConfig;
use usdt_wallet_link::provider::{RecordingLauncher, RecordingRelay};
use usdt_wallet_link::storage::{KeyValueStore, MemoryKeyValueStore};
use usdt_wallet_link::WalletManager;

pub const ALICE: &str = "0x1111111111111111111111111111111111111111";
#[allow(dead_code)]
pub const BOB: &str = "0x2222222222222222222222222222222222222222";
#[allow(dead_code)]
pub const TRON_MERCHANT: &str = "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7";

pub struct Harness {
    pub manager: Arc<WalletManager>,
    pub relay: Arc<RecordingRelay>,
    pub launcher: Arc<RecordingLauncher>,
}

/// MetaMask and TronLink installed, sessions kept in `store`.
pub fn harness_with_store(store: Arc<dyn KeyValueStore>) -> Harness {
    let relay = Arc::new(RecordingRelay::new());
    let launcher = Arc::new(RecordingLauncher::with_installed(&["metamask://", "tronlinkoutside://"]));
    let manager = WalletManager::new(WalletLinkConfig::default(), relay.clone(), launcher.clone(), store);
    Harness { manager: Arc::new(manager), relay, launcher }
}

#[allow(dead_code)]
pub fn harness() -> Harness {
    harness_with_store(Arc::new(MemoryKeyValueStore::new()))
}
