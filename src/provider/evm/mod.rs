//! EVM 配对连接
//!
//! Connects Ethereum, BSC and Polygon through an out-of-band pairing channel. `connect`
//! returns as soon as the pairing URI is published; the wallet's settle event, delivered via
//! [`EvmPairingProvider::handle_session_settled`], completes the connection.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use super::launcher::AppLauncher;
use super::pending::PendingSlot;
use super::state::{StateObserver, StatePublisher};
use super::{ensure_supported, ProviderKind, WalletConnectionProvider};
use crate::core::config::{AppConfig, WalletConnectConfig};
use crate::core::domain::{
    ApproveRequest, ConnectionState, TransactionRequest, TransactionResult, WalletSession,
};
use crate::core::errors::WalletProviderError;
use crate::core::validation::validate_ethereum_address;
use crate::network::wallets::{self, WalletAppInfo};
use crate::network::{lookup, Network};
use crate::storage::SessionVault;

mod pairing;
mod relay;

pub use pairing::{PairingUri, PAIRING_VERSION};
pub use relay::{
    DappMetadata, EthTransaction, PairingRelay, ProposalNamespace, RecordingRelay, SessionProposal,
    SessionResponse, SignRequest, METHOD_SEND_TRANSACTION,
};

/// Host segment of callbacks that belong to this provider.
pub const CALLBACK_HOSTS: [&str; 2] = ["wc", "walletconnect"];

const CONNECT_TIMEOUT_MESSAGE: &str = "Connection timed out, please retry";

struct PairingAttempt {
    uri: PairingUri,
    network: Network,
}

struct EvmInner {
    config: WalletConnectConfig,
    app: AppConfig,
    relay: Arc<dyn PairingRelay>,
    launcher: Arc<dyn AppLauncher>,
    vault: SessionVault,
    publisher: StatePublisher,
    pending: PendingSlot,
    attempt: Mutex<Option<PairingAttempt>>,
}

/// Pairing-channel provider for EVM networks.
#[derive(Clone)]
pub struct EvmPairingProvider {
    inner: Arc<EvmInner>,
}

impl EvmPairingProvider {
    pub fn new(
        config: WalletConnectConfig,
        app: AppConfig,
        relay: Arc<dyn PairingRelay>,
        launcher: Arc<dyn AppLauncher>,
        vault: SessionVault,
    ) -> Self {
        Self {
            inner: Arc::new(EvmInner {
                config,
                app,
                relay,
                launcher,
                vault,
                publisher: StatePublisher::new(ProviderKind::Pairing),
                pending: PendingSlot::new(ProviderKind::Pairing.name()),
                attempt: Mutex::new(None),
            }),
        }
    }

    /// Pairing URI of the attempt in flight, if any.
    pub fn pairing_uri(&self) -> Option<String> {
        self.inner.attempt.lock().as_ref().map(|a| a.uri.to_string())
    }

    pub fn has_pending_request(&self) -> bool {
        self.inner.pending.is_pending()
    }

    /// Wallet approved the pairing. Only honoured while a connection attempt is in flight.
    pub async fn handle_session_settled(&self, address: &str, chain_id: u64, wallet_name: &str) -> bool {
        let inner = &self.inner;
        if !inner.publisher.current().is_pending() {
            warn!(chain_id, "settle event without a connection attempt, ignored");
            return false;
        }

        let Some(network) = Network::from_chain_id(chain_id) else {
            inner.publisher.transition(ConnectionState::Error(format!("Unsupported chain id: {chain_id}")));
            inner.attempt.lock().take();
            return false;
        };
        if validate_ethereum_address(address).is_err() {
            inner
                .publisher
                .transition(ConnectionState::Error(WalletProviderError::InvalidAddress.to_string()));
            inner.attempt.lock().take();
            return false;
        }

        let attempt = inner.attempt.lock().take();
        if let Some(requested) = attempt.as_ref().map(|a| a.network).filter(|n| *n != network) {
            info!(requested = %requested, settled = %network, "wallet approved a different chain than requested");
        }
        let topic = attempt
            .map(|a| a.uri.topic)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let session = WalletSession::new(topic, address, network, wallet_name);

        if let Err(e) = inner.vault.save(&session).await {
            warn!(error = %e, "failed to persist walletconnect session");
        }
        let short = session.short_address();
        if inner
            .publisher
            .transition_if(ConnectionState::is_pending, ConnectionState::Connected(session))
            .is_none()
        {
            // cancelled while persisting
            if let Err(e) = inner.vault.clear().await {
                warn!(error = %e, "failed to clear walletconnect session");
            }
            return false;
        }
        info!(address = %short, network = %network, wallet = wallet_name, "walletconnect session established");
        true
    }

    /// Wallet ended the session from its side.
    pub async fn handle_session_deleted(&self) {
        let inner = &self.inner;
        inner.attempt.lock().take();
        inner.pending.resolve(TransactionResult::Failed(WalletProviderError::NotConnected));
        if let Err(e) = inner.vault.clear().await {
            warn!(error = %e, "failed to clear walletconnect session");
        }
        inner.publisher.transition(ConnectionState::Disconnected);
        info!("wallet closed the walletconnect session");
    }

    /// Response to the outstanding sign request. Returns false if nothing was waiting.
    pub fn handle_session_response(&self, response: SessionResponse) -> bool {
        debug!(?response, "walletconnect response received");
        self.inner.pending.resolve(response.into_result())
    }

    /// Opens `wallet` with the pairing URI, universal link first.
    pub async fn open_wallet_with_uri(&self, wallet: &WalletAppInfo, uri: &str) -> bool {
        let Ok(url) = Url::parse(&wallet_link_for_uri(wallet, uri)) else {
            warn!(wallet = wallet.name, "could not build wallet link");
            return false;
        };
        self.inner.launcher.open(&url).await
    }

    /// Settles the current attempt with a fixed wallet, for demos without a real wallet.
    #[cfg(any(test, feature = "test-env"))]
    pub async fn simulate_connection(&self, wallet_name: &str) -> bool {
        let chain_id = self
            .inner
            .attempt
            .lock()
            .as_ref()
            .and_then(|a| a.network.chain_id())
            .unwrap_or(1);
        self.handle_session_settled("0x1111111111111111111111111111111111111111", chain_id, wallet_name)
            .await
    }

    async fn submit(&self, session: WalletSession, network: Network, data: String) -> TransactionResult {
        let inner = &self.inner;
        let info = lookup(network);
        let Some(chain_id) = info.chain_id_hex() else {
            return TransactionResult::Failed(WalletProviderError::UnsupportedNetwork);
        };
        let request = SignRequest {
            topic: session.id.clone(),
            chain_id: info.caip2.to_string(),
            method: METHOD_SEND_TRANSACTION.to_string(),
            params: vec![EthTransaction {
                from: session.address.clone(),
                to: info.usdt_contract.to_string(),
                data,
                chain_id,
                value: "0x0".to_string(),
            }],
        };

        let ticket = match inner.pending.begin() {
            Ok(ticket) => ticket,
            Err(e) => return TransactionResult::Failed(e),
        };
        if let Err(e) = inner.relay.send_request(&request).await {
            warn!(error = %e, "failed to send sign request");
            return TransactionResult::Failed(WalletProviderError::TransactionFailed(e.to_string()));
        }
        inner.pending.arm_timeout(ticket.id(), inner.config.request_timeout());
        info!(network = %network, request = ticket.id(), "sign request sent, waiting for wallet");

        self.open_session_wallet(&session).await;
        ticket.wait().await
    }

    /// Brings the session's wallet to the foreground so the user sees the request.
    async fn open_session_wallet(&self, session: &WalletSession) {
        let Some(wallet) = wallets::find_by_name(&session.wallet_name) else {
            return;
        };
        if let Ok(url) = Url::parse(wallet.deep_link_scheme) {
            if self.inner.launcher.can_open(&url) && !self.inner.launcher.open(&url).await {
                debug!(wallet = wallet.name, "wallet app did not open");
            }
        }
    }

    fn connected_session(&self) -> Result<WalletSession, WalletProviderError> {
        self.inner.publisher.current().session().cloned().ok_or(WalletProviderError::NotConnected)
    }

    fn spawn_connect_timeout(&self, generation: u64) {
        let weak: Weak<EvmInner> = Arc::downgrade(&self.inner);
        let after = self.inner.config.connect_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let Some(inner) = weak.upgrade() else { return };
            if inner
                .publisher
                .transition_from(generation, ConnectionState::Error(CONNECT_TIMEOUT_MESSAGE.to_string()))
            {
                inner.attempt.lock().take();
                warn!(timeout_secs = after.as_secs(), "walletconnect pairing timed out");
            }
        });
    }
}

/// `{universal}/wc?uri={enc}` when the wallet has a universal link, else `{scheme}wc?uri={enc}`.
pub fn wallet_link_for_uri(wallet: &WalletAppInfo, uri: &str) -> String {
    let encoded = urlencoding::encode(uri);
    match wallet.universal_link {
        Some(universal) => format!("{universal}/wc?uri={encoded}"),
        None => format!("{}wc?uri={encoded}", wallet.deep_link_scheme),
    }
}

#[async_trait]
impl WalletConnectionProvider for EvmPairingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Pairing
    }

    fn supported_networks(&self) -> Vec<Network> {
        Network::evm_chains()
    }

    fn state(&self) -> ConnectionState {
        self.inner.publisher.current()
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionState> {
        self.inner.publisher.subscribe()
    }

    fn add_observer(&self, observer: Arc<dyn StateObserver>) {
        self.inner.publisher.add_observer(observer);
    }

    fn replay_state(&self, observer: &dyn StateObserver) {
        self.inner.publisher.replay(observer);
    }

    async fn connect(&self, network: Network) -> Result<(), WalletProviderError> {
        ensure_supported(ProviderKind::Pairing, network)?;
        if network.chain_id().is_none() {
            return Err(WalletProviderError::UnsupportedNetwork);
        }
        let inner = &self.inner;
        inner.publisher.transition(ConnectionState::Connecting);

        let uri = PairingUri::generate(&inner.config.relay_protocol);
        let proposal = SessionProposal::new(&uri, network, &inner.app);
        if let Err(e) = inner.relay.propose_session(&proposal).await {
            let message = e.to_string();
            inner.publisher.transition(ConnectionState::Error(message.clone()));
            return Err(WalletProviderError::ConnectionFailed(message));
        }

        let payload = uri.to_string();
        *inner.attempt.lock() = Some(PairingAttempt { uri, network });
        let generation = inner.publisher.transition(ConnectionState::WaitingForApproval(payload));
        self.spawn_connect_timeout(generation);
        info!(network = %network, "pairing uri generated, waiting for wallet approval");
        Ok(())
    }

    async fn disconnect(&self) {
        let inner = &self.inner;
        let attempt_topic = inner.attempt.lock().take().map(|a| a.uri.topic);
        let topic = inner.publisher.current().session().map(|s| s.id.clone()).or(attempt_topic);

        if let Some(topic) = topic {
            if let Err(e) = inner.relay.disconnect(&topic).await {
                warn!(error = %e, "walletconnect teardown failed, clearing locally");
            }
        }
        inner.pending.resolve(TransactionResult::Failed(WalletProviderError::NotConnected));
        if let Err(e) = inner.vault.clear().await {
            warn!(error = %e, "failed to clear walletconnect session");
        }
        inner.publisher.transition(ConnectionState::Disconnected);
        info!("walletconnect disconnected");
    }

    async fn send_transaction(&self, request: TransactionRequest) -> TransactionResult {
        let session = match self.connected_session() {
            Ok(session) => session,
            Err(e) => return TransactionResult::Failed(e),
        };
        if let Err(e) = ensure_supported(ProviderKind::Pairing, request.network)
            .and_then(|_| validate_ethereum_address(&request.to_address))
        {
            return TransactionResult::Failed(e);
        }
        match request.call_data_hex() {
            Ok(data) => self.submit(session, request.network, data).await,
            Err(e) => TransactionResult::Failed(e),
        }
    }

    async fn approve(&self, request: ApproveRequest) -> TransactionResult {
        let session = match self.connected_session() {
            Ok(session) => session,
            Err(e) => return TransactionResult::Failed(e),
        };
        if let Err(e) = ensure_supported(ProviderKind::Pairing, request.network)
            .and_then(|_| validate_ethereum_address(&request.spender_address))
        {
            return TransactionResult::Failed(e);
        }
        match request.call_data_hex() {
            Ok(data) => self.submit(session, request.network, data).await,
            Err(e) => TransactionResult::Failed(e),
        }
    }

    async fn restore_session(&self) -> bool {
        let inner = &self.inner;
        let session = match inner.vault.load().await {
            Ok(Some(session)) => session,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "failed to load walletconnect session");
                return false;
            }
        };

        let usable = session.network.is_evm()
            && !session.is_expired(Utc::now(), inner.config.session_max_age());
        if !usable {
            info!(network = %session.network, "stored walletconnect session expired, discarding");
            if let Err(e) = inner.vault.clear().await {
                warn!(error = %e, "failed to clear walletconnect session");
            }
            return false;
        }

        info!(address = %session.short_address(), network = %session.network, "walletconnect session restored");
        inner.publisher.transition(ConnectionState::Connected(session));
        true
    }

    async fn cancel(&self) {
        let inner = &self.inner;
        if inner
            .publisher
            .transition_if(ConnectionState::is_pending, ConnectionState::Disconnected)
            .is_some()
        {
            inner.attempt.lock().take();
            info!("walletconnect connection attempt cancelled");
        }
    }

    async fn handle_callback(&self, url: &Url) -> bool {
        let matches = url.host_str().is_some_and(|host| CALLBACK_HOSTS.contains(&host));
        if matches {
            // the relay carries the actual response; the callback only brings the app back
            debug!(path = url.path(), "walletconnect return-to-app callback");
        }
        matches
    }

    fn is_wallet_installed(&self) -> bool {
        wallets::pairing_wallets().iter().any(|wallet| {
            Url::parse(wallet.deep_link_scheme).is_ok_and(|url| self.inner.launcher.can_open(&url))
        })
    }
}
