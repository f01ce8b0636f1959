//! Manager-level view of the active connection.

use crate::core::domain::{ConnectionState, WalletSession};
use crate::network::Network;
use crate::provider::ProviderKind;

/// Snapshot the UI renders. Updated only through [`WalletStatus::apply`] and
/// [`WalletStatus::reset`], which keep `session` present exactly when connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletStatus {
    pub connection_state: ConnectionState,
    pub current_network: Network,
    pub active_provider: Option<ProviderKind>,
    pub session: Option<WalletSession>,
    /// Pairing URI or deep link while waiting for approval.
    pub pairing_uri: Option<String>,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub last_transaction_hash: Option<String>,
    pub is_transaction_pending: bool,
}

impl Default for WalletStatus {
    fn default() -> Self {
        Self {
            connection_state: ConnectionState::Disconnected,
            current_network: Network::Ethereum,
            active_provider: None,
            session: None,
            pairing_uri: None,
            is_loading: false,
            error_message: None,
            last_transaction_hash: None,
            is_transaction_pending: false,
        }
    }
}

impl WalletStatus {
    /// Mirrors a provider transition.
    pub fn apply(&mut self, state: &ConnectionState) {
        self.connection_state = state.clone();
        match state {
            ConnectionState::Disconnected => {
                self.session = None;
                self.pairing_uri = None;
                self.is_loading = false;
            }
            ConnectionState::Connecting => {
                self.session = None;
                self.is_loading = true;
                self.error_message = None;
            }
            ConnectionState::WaitingForApproval(uri) => {
                self.session = None;
                self.is_loading = false;
                self.pairing_uri = Some(uri.clone());
            }
            ConnectionState::Connected(session) => {
                self.current_network = session.network;
                self.session = Some(session.clone());
                self.pairing_uri = None;
                self.is_loading = false;
                self.error_message = None;
            }
            ConnectionState::Error(message) => {
                self.session = None;
                self.pairing_uri = None;
                self.is_loading = false;
                self.error_message = Some(message.clone());
            }
        }
    }

    /// Back to Disconnected with nothing active, keeping the selected network.
    pub fn reset(&mut self) {
        *self = Self { current_network: self.current_network, ..Self::default() };
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state.is_connected()
    }

    pub fn account_address(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.address.as_str())
    }

    pub fn status_text(&self) -> String {
        match &self.connection_state {
            ConnectionState::Disconnected => "Not connected".to_string(),
            ConnectionState::Connecting => "Connecting...".to_string(),
            ConnectionState::WaitingForApproval(_) => "Waiting for wallet approval...".to_string(),
            ConnectionState::Connected(session) => format!("Connected: {}", session.short_address()),
            ConnectionState::Error(message) => format!("Error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn session(network: Network) -> WalletSession {
        WalletSession::new("id", "0x1111111111111111111111111111111111111111", network, "MetaMask")
    }

    fn any_state() -> impl Strategy<Value = ConnectionState> {
        prop_oneof![
            Just(ConnectionState::Disconnected),
            Just(ConnectionState::Connecting),
            "[a-z]{1,8}".prop_map(ConnectionState::WaitingForApproval),
            prop::sample::select(Network::ALL.to_vec()).prop_map(|n| ConnectionState::Connected(session(n))),
            "[a-z ]{0,12}".prop_map(ConnectionState::Error),
        ]
    }

    proptest! {
        #[test]
        fn session_present_iff_connected(states in prop::collection::vec(any_state(), 0..24)) {
            let mut status = WalletStatus::default();
            for state in &states {
                status.apply(state);
                prop_assert_eq!(status.session.is_some(), status.is_connected());
                prop_assert_eq!(status.session.as_ref(), state.session());
            }
        }
    }

    #[test]
    fn test_connected_updates_network_and_text() {
        let mut status = WalletStatus::default();
        status.apply(&ConnectionState::Connected(session(Network::Polygon)));
        assert_eq!(status.current_network, Network::Polygon);
        assert_eq!(status.status_text(), "Connected: 0x1111...1111");
    }

    #[test]
    fn test_reset_keeps_network() {
        let mut status = WalletStatus { current_network: Network::Tron, ..Default::default() };
        status.error_message = Some("x".into());
        status.last_transaction_hash = Some("h".into());
        status.reset();
        assert_eq!(status.current_network, Network::Tron);
        assert_eq!(status.error_message, None);
        assert_eq!(status.last_transaction_hash, None);
        assert_eq!(status.status_text(), "Not connected");
    }

    #[test]
    fn test_status_texts() {
        let mut status = WalletStatus::default();
        status.apply(&ConnectionState::Connecting);
        assert_eq!(status.status_text(), "Connecting...");
        status.apply(&ConnectionState::WaitingForApproval("wc:x".into()));
        assert_eq!(status.status_text(), "Waiting for wallet approval...");
        assert_eq!(status.pairing_uri.as_deref(), Some("wc:x"));
        status.apply(&ConnectionState::Error("boom".into()));
        assert_eq!(status.status_text(), "Error: boom");
    }
}
