//! 钱包连接提供者
//!
//! One trait, two strategies: the pairing provider for EVM chains and the deep-link provider
//! for TRON. [`ProviderKind::for_network`] is the only place a network is mapped to a strategy.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

use crate::core::domain::{ApproveRequest, ConnectionState, TransactionRequest, TransactionResult, WalletSession};
use crate::core::errors::WalletProviderError;
use crate::network::{Network, ProtocolFamily};

pub mod evm;
pub mod launcher;
pub mod pending;
pub mod state;
pub mod tron;

pub use evm::{EvmPairingProvider, PairingRelay, PairingUri, RecordingRelay, SessionResponse};
pub use launcher::{AppLauncher, RecordingLauncher};
pub use pending::{PendingSlot, PendingTicket};
pub use state::{StateObserver, StatePublisher};
pub use tron::TronLinkProvider;

/// Which connection strategy serves a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Out-of-band pairing channel (WalletConnect-style), EVM chains.
    Pairing,
    /// App-switch deep links (TronLink-style), TRON.
    DeepLink,
}

impl ProviderKind {
    /// Total over [`Network`]: the protocol family alone decides.
    pub fn for_network(network: Network) -> Self {
        match network.family() {
            ProtocolFamily::Evm => ProviderKind::Pairing,
            ProtocolFamily::Tron => ProviderKind::DeepLink,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Pairing => "walletconnect",
            ProviderKind::DeepLink => "tronlink",
        }
    }
}

/// Uniform interface over both connection protocols.
#[async_trait]
pub trait WalletConnectionProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn supported_networks(&self) -> Vec<Network>;

    fn state(&self) -> ConnectionState;

    fn current_session(&self) -> Option<WalletSession> {
        self.state().session().cloned()
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionState>;

    fn add_observer(&self, observer: Arc<dyn StateObserver>);

    /// Delivers the current state to `observer` without racing a concurrent transition.
    fn replay_state(&self, observer: &dyn StateObserver);

    /// Starts a connection attempt. Returns once the wallet has been asked; the approval
    /// arrives later as an event or callback.
    async fn connect(&self, network: Network) -> Result<(), WalletProviderError>;

    /// Best-effort teardown, always ends Disconnected.
    async fn disconnect(&self);

    async fn send_transaction(&self, request: TransactionRequest) -> TransactionResult;

    async fn approve(&self, request: ApproveRequest) -> TransactionResult;

    /// Adopts a persisted session if it is still usable.
    async fn restore_session(&self) -> bool;

    /// Abandons a Connecting/WaitingForApproval attempt.
    async fn cancel(&self);

    /// Returns true if the callback belonged to this provider and was consumed.
    async fn handle_callback(&self, url: &Url) -> bool;

    fn is_wallet_installed(&self) -> bool;
}

pub(crate) fn ensure_supported(
    kind: ProviderKind,
    network: Network,
) -> Result<(), WalletProviderError> {
    if ProviderKind::for_network(network) == kind {
        Ok(())
    } else {
        Err(WalletProviderError::UnsupportedNetwork)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_is_total_and_disjoint() {
        for network in Network::ALL {
            let kind = ProviderKind::for_network(network);
            assert_eq!(kind == ProviderKind::Pairing, network.is_evm());
            assert!(ensure_supported(kind, network).is_ok());
        }
        assert_eq!(
            ensure_supported(ProviderKind::Pairing, Network::Tron),
            Err(WalletProviderError::UnsupportedNetwork)
        );
    }
}
