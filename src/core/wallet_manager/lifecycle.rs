//! Connection lifecycle: connect, disconnect, switch network, restore.

use tracing::{info, warn};

use super::WalletManager;
use crate::core::errors::WalletProviderError;
use crate::network::wallets::WalletAppInfo;
use crate::network::Network;
use crate::provider::ProviderKind;

/// Restore order: EVM sessions first.
const RESTORE_ORDER: [ProviderKind; 2] = [ProviderKind::Pairing, ProviderKind::DeepLink];

impl WalletManager {
    /// Connects on `network`, or the current network when `None`.
    ///
    /// A no-op when already connected on that network. Any other active connection or attempt
    /// is torn down first.
    pub async fn connect_wallet(&self, network: Option<Network>) -> Result<(), WalletProviderError> {
        let _guard = self.lifecycle.lock().await;
        let network = network.unwrap_or_else(|| self.current_network());
        if self.already_connected_on(network) {
            return Ok(());
        }
        self.begin_attempt(network).await;
        self.start_connect(network).await
    }

    /// Connects on `network` and hands the pairing URI to `wallet`.
    pub async fn connect_with_wallet(
        &self,
        wallet: &WalletAppInfo,
        network: Network,
    ) -> Result<(), WalletProviderError> {
        let _guard = self.lifecycle.lock().await;
        if !wallet.supported_networks.contains(&network) {
            return Err(WalletProviderError::UnsupportedNetwork);
        }
        self.begin_attempt(network).await;
        self.start_connect(network).await?;

        if ProviderKind::for_network(network) == ProviderKind::Pairing {
            if let Some(uri) = self.evm.pairing_uri() {
                if !self.evm.open_wallet_with_uri(wallet, &uri).await {
                    warn!(wallet = wallet.name, "wallet app did not open, pairing uri still shown");
                }
            }
        }
        Ok(())
    }

    /// Tears down the active connection. Manager state is cleared even if the provider
    /// teardown fails.
    pub async fn disconnect_wallet(&self) {
        let _guard = self.lifecycle.lock().await;
        self.teardown().await;
    }

    /// Changes the selected network. Within one provider a live session is kept; crossing to
    /// the other protocol family disconnects first.
    pub async fn switch_network(&self, network: Network) {
        let _guard = self.lifecycle.lock().await;
        let (active, connected, current) = {
            let status = self.shared.status.read();
            (status.active_provider, status.is_connected(), status.current_network)
        };
        if current == network {
            return;
        }
        let target = ProviderKind::for_network(network);
        if connected && active == Some(target) {
            self.shared.status.write().current_network = network;
            info!(from = %current, to = %network, "switched network within provider");
            return;
        }
        if active.is_some() {
            self.teardown().await;
        }
        self.shared.status.write().current_network = network;
        info!(from = %current, to = %network, "switched network");
    }

    /// Abandons an attempt that is still waiting for the wallet.
    pub async fn cancel_connection(&self) {
        let _guard = self.lifecycle.lock().await;
        let (active, pending) = {
            let status = self.shared.status.read();
            (status.active_provider, status.connection_state.is_pending())
        };
        let Some(kind) = active.filter(|_| pending) else {
            return;
        };
        self.provider(kind).cancel().await;
        self.shared.reset();
        info!(provider = kind.name(), "connection attempt cancelled");
    }

    /// Tries each provider's persisted session; the first usable one becomes active.
    pub async fn restore_previous_session(&self) -> Option<ProviderKind> {
        let _guard = self.lifecycle.lock().await;
        for kind in RESTORE_ORDER {
            if self.provider(kind).restore_session().await {
                self.adopt(kind);
                info!(provider = kind.name(), "previous session restored");
                return Some(kind);
            }
        }
        None
    }

    fn already_connected_on(&self, network: Network) -> bool {
        let status = self.shared.status.read();
        status.is_connected() && status.current_network == network
    }

    /// Tears down whatever is active and selects `network` with a clean slate.
    async fn begin_attempt(&self, network: Network) {
        if self.active_provider().is_some() {
            self.teardown().await;
        }
        let mut status = self.shared.status.write();
        status.current_network = network;
        status.error_message = None;
    }

    async fn start_connect(&self, network: Network) -> Result<(), WalletProviderError> {
        let kind = ProviderKind::for_network(network);
        self.adopt(kind);
        info!(provider = kind.name(), network = %network, "connecting wallet");
        if let Err(e) = self.provider(kind).connect(network).await {
            warn!(provider = kind.name(), error = %e, "connect failed");
            let mut status = self.shared.status.write();
            status.error_message = Some(e.to_string());
            status.is_loading = false;
            return Err(e);
        }
        Ok(())
    }

    async fn teardown(&self) {
        if let Some(kind) = self.active_provider() {
            self.provider(kind).disconnect().await;
        }
        self.shared.reset();
        info!("wallet disconnected");
    }
}
