//! 钱包管理器
//!
//! Owns one provider per protocol family, routes every operation to the provider that serves
//! the current network, and mirrors the active provider's state into a [`WalletStatus`].
//!
//! ## Module Structure
//! - `lifecycle` - connect, disconnect, switch network, restore
//! - `transactions` - USDT transfer and approve
//! - `callbacks` - inbound deep-link routing
//! - `status` - the mirrored view and its text

pub mod callbacks;
pub mod lifecycle;
pub mod status;
pub mod transactions;

pub use status::WalletStatus;

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;
use url::Url;

use crate::core::config::WalletLinkConfig;
use crate::core::domain::{ConnectionState, TransactionResult, WalletSession};
use crate::network::wallets::{self, WalletAppInfo, SUPPORTED_WALLETS};
use crate::network::{lookup, Network};
use crate::provider::evm::PairingRelay;
use crate::provider::tron::PENDING_TX_HASH;
use crate::provider::{
    AppLauncher, EvmPairingProvider, ProviderKind, StateObserver, TronLinkProvider, WalletConnectionProvider,
};
use crate::storage::{KeyValueStore, SessionVault};

const CHANNEL_CAPACITY: usize = 64;

/// State shared with the providers' publishers.
struct ManagerShared {
    status: RwLock<WalletStatus>,
    state_tx: broadcast::Sender<ConnectionState>,
    result_tx: broadcast::Sender<TransactionResult>,
}

impl ManagerShared {
    fn new() -> Self {
        let (state_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (result_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { status: RwLock::new(WalletStatus::default()), state_tx, result_tx }
    }

    /// Resets to Disconnected; publishes only if something was showing.
    fn reset(&self) {
        let mut status = self.status.write();
        let was_disconnected = status.connection_state == ConnectionState::Disconnected;
        status.reset();
        if !was_disconnected {
            let _ = self.state_tx.send(ConnectionState::Disconnected);
        }
    }
}

impl StateObserver for ManagerShared {
    // Runs under the provider's publisher lock. Must not call back into a provider.
    fn on_state_changed(&self, source: ProviderKind, state: &ConnectionState) {
        let mut status = self.status.write();
        if status.active_provider != Some(source) {
            debug!(source = source.name(), "state change from inactive provider ignored");
            return;
        }
        status.apply(state);
        let _ = self.state_tx.send(state.clone());
    }
}

/// Entry point for the UI: one connection at a time, on one network at a time.
pub struct WalletManager {
    config: WalletLinkConfig,
    evm: EvmPairingProvider,
    tron: TronLinkProvider,
    launcher: Arc<dyn AppLauncher>,
    shared: Arc<ManagerShared>,
    /// Serializes connect, disconnect, switch and restore.
    lifecycle: Mutex<()>,
    /// Held for the duration of one transfer or approval.
    transaction_gate: Mutex<()>,
}

impl WalletManager {
    /// Builds both providers over `store`, each under its configured key.
    pub fn new(
        config: WalletLinkConfig,
        relay: Arc<dyn PairingRelay>,
        launcher: Arc<dyn AppLauncher>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let evm = EvmPairingProvider::new(
            config.walletconnect.clone(),
            config.app.clone(),
            relay,
            launcher.clone(),
            SessionVault::new(store.clone(), config.walletconnect.storage_key.clone()),
        );
        let tron = TronLinkProvider::new(
            config.tronlink.clone(),
            config.app.clone(),
            launcher.clone(),
            SessionVault::new(store, config.tronlink.storage_key.clone()),
        );
        Self::with_providers(config, evm, tron, launcher)
    }

    pub fn with_providers(
        config: WalletLinkConfig,
        evm: EvmPairingProvider,
        tron: TronLinkProvider,
        launcher: Arc<dyn AppLauncher>,
    ) -> Self {
        let shared = Arc::new(ManagerShared::new());
        evm.add_observer(shared.clone());
        tron.add_observer(shared.clone());
        Self {
            config,
            evm,
            tron,
            launcher,
            shared,
            lifecycle: Mutex::new(()),
            transaction_gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &WalletLinkConfig {
        &self.config
    }

    /// The EVM provider, for delivering relay events (settle, delete, responses).
    pub fn pairing_provider(&self) -> &EvmPairingProvider {
        &self.evm
    }

    pub fn deep_link_provider(&self) -> &TronLinkProvider {
        &self.tron
    }

    fn provider(&self, kind: ProviderKind) -> &dyn WalletConnectionProvider {
        match kind {
            ProviderKind::Pairing => &self.evm,
            ProviderKind::DeepLink => &self.tron,
        }
    }

    /// Makes `kind` the active provider and mirrors its current state.
    fn adopt(&self, kind: ProviderKind) {
        self.shared.status.write().active_provider = Some(kind);
        self.provider(kind).replay_state(self.shared.as_ref());
    }

    /// Snapshot of everything the UI shows.
    pub fn status(&self) -> WalletStatus {
        self.shared.status.read().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.status.read().connection_state.clone()
    }

    pub fn current_network(&self) -> Network {
        self.shared.status.read().current_network
    }

    pub fn current_session(&self) -> Option<WalletSession> {
        self.shared.status.read().session.clone()
    }

    pub fn active_provider(&self) -> Option<ProviderKind> {
        self.shared.status.read().active_provider
    }

    pub fn is_connected(&self) -> bool {
        self.shared.status.read().is_connected()
    }

    pub fn pairing_uri(&self) -> Option<String> {
        self.shared.status.read().pairing_uri.clone()
    }

    pub fn error_message(&self) -> Option<String> {
        self.shared.status.read().error_message.clone()
    }

    pub fn last_transaction_hash(&self) -> Option<String> {
        self.shared.status.read().last_transaction_hash.clone()
    }

    /// Mirrored connection states, in the order the active provider published them.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// One result per transfer or approval call.
    pub fn subscribe_transactions(&self) -> broadcast::Receiver<TransactionResult> {
        self.shared.result_tx.subscribe()
    }

    pub fn clear_error(&self) {
        self.shared.status.write().error_message = None;
    }

    pub fn network_name(&self) -> &'static str {
        self.current_network().name()
    }

    pub fn short_account_address(&self) -> Option<String> {
        self.shared.status.read().session.as_ref().map(WalletSession::short_address)
    }

    pub fn connection_status_text(&self) -> String {
        self.shared.status.read().status_text()
    }

    /// Block explorer link for a hash on the current network. `None` for the
    /// placeholder hash TronLink reports before broadcast.
    pub fn explorer_url(&self, tx_hash: &str) -> Option<String> {
        if tx_hash.is_empty() || tx_hash == PENDING_TX_HASH {
            return None;
        }
        Some(lookup(self.current_network()).explorer_url(tx_hash))
    }

    /// Wallets offered for the current network.
    pub fn available_wallets(&self) -> Vec<&'static WalletAppInfo> {
        wallets::wallets_for(self.current_network())
    }

    pub fn all_supported_wallets(&self) -> &'static [WalletAppInfo] {
        &SUPPORTED_WALLETS
    }

    pub fn is_wallet_installed(&self, wallet: &WalletAppInfo) -> bool {
        Url::parse(wallet.deep_link_scheme).is_ok_and(|url| self.launcher.can_open(&url))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::provider::{RecordingLauncher, RecordingRelay};
    use crate::storage::MemoryKeyValueStore;

    pub const ALICE: &str = "0x1111111111111111111111111111111111111111";
    pub const BOB: &str = "0x2222222222222222222222222222222222222222";
    pub const TRON_BOB: &str = "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7";

    pub struct Fixture {
        pub manager: Arc<WalletManager>,
        pub relay: Arc<RecordingRelay>,
        pub launcher: Arc<RecordingLauncher>,
        pub store: MemoryKeyValueStore,
    }

    pub fn fixture() -> Fixture {
        let relay = Arc::new(RecordingRelay::new());
        let launcher = Arc::new(RecordingLauncher::with_installed(&["metamask://", "tronlinkoutside://"]));
        let store = MemoryKeyValueStore::new();
        let manager = WalletManager::new(
            WalletLinkConfig::default(),
            relay.clone(),
            launcher.clone(),
            Arc::new(store.clone()),
        );
        Fixture { manager: Arc::new(manager), relay, launcher, store }
    }

    /// Connects on Ethereum and settles with ALICE.
    pub async fn connected_evm(f: &Fixture) {
        f.manager.connect_wallet(Some(Network::Ethereum)).await.unwrap();
        assert!(f.manager.pairing_provider().handle_session_settled(ALICE, 1, "MetaMask").await);
    }
}
