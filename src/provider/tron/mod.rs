//! TronLink 深度链接连接
//!
//! TRON has no pairing relay, so every interaction is an app switch to TronLink and a
//! callback URL back into the host app. Callbacks carry no request id; correlation is
//! "whatever is pending", hence the single [`PendingSlot`].

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use super::launcher::AppLauncher;
use super::pending::PendingSlot;
use super::state::{StateObserver, StatePublisher};
use super::{ensure_supported, ProviderKind, WalletConnectionProvider};
use crate::core::config::{AppConfig, TronLinkConfig};
use crate::core::domain::{
    short_address, ApproveRequest, ConnectionState, TransactionRequest, TransactionResult, WalletSession,
};
use crate::core::errors::WalletProviderError;
use crate::core::validation::validate_tron_address;
use crate::network::Network;
use crate::storage::SessionVault;

mod deeplink;

pub use deeplink::{CallbackResult, TronAction, TronCallback, TronLinkIntent, CALLBACK_HOST, UINT256_MAX_DECIMAL};

pub const TRONLINK_WALLET_NAME: &str = "TronLink";
/// Substituted when the wallet reports success without a hash yet.
pub const PENDING_TX_HASH: &str = "pending";

const CONNECT_TIMEOUT_MESSAGE: &str = "TronLink authorization timed out, please retry";

struct TronInner {
    config: TronLinkConfig,
    app: AppConfig,
    launcher: Arc<dyn AppLauncher>,
    vault: SessionVault,
    publisher: StatePublisher,
    pending: PendingSlot,
}

/// Deep-link provider for the TRON network.
#[derive(Clone)]
pub struct TronLinkProvider {
    inner: Arc<TronInner>,
}

impl TronLinkProvider {
    pub fn new(
        config: TronLinkConfig,
        app: AppConfig,
        launcher: Arc<dyn AppLauncher>,
        vault: SessionVault,
    ) -> Self {
        Self {
            inner: Arc::new(TronInner {
                config,
                app,
                launcher,
                vault,
                publisher: StatePublisher::new(ProviderKind::DeepLink),
                pending: PendingSlot::new(ProviderKind::DeepLink.name()),
            }),
        }
    }

    pub fn app_store_url(&self) -> &str {
        &self.inner.config.app_store_url
    }

    /// Sends the user to the store page to install TronLink.
    pub async fn open_app_store(&self) -> bool {
        match Url::parse(&self.inner.config.app_store_url) {
            Ok(url) => self.inner.launcher.open(&url).await,
            Err(e) => {
                warn!(error = %e, "invalid app store url");
                false
            }
        }
    }

    pub fn has_pending_request(&self) -> bool {
        self.inner.pending.is_pending()
    }

    fn not_installed() -> WalletProviderError {
        WalletProviderError::WalletAppNotInstalled(TRONLINK_WALLET_NAME.to_string())
    }

    fn connected_session(&self) -> Result<WalletSession, WalletProviderError> {
        self.inner.publisher.current().session().cloned().ok_or(WalletProviderError::NotConnected)
    }

    fn spawn_connect_timeout(&self, generation: u64) {
        let weak: Weak<TronInner> = Arc::downgrade(&self.inner);
        let after = self.inner.config.connect_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let Some(inner) = weak.upgrade() else { return };
            if inner
                .publisher
                .transition_from(generation, ConnectionState::Error(CONNECT_TIMEOUT_MESSAGE.to_string()))
            {
                warn!(timeout_secs = after.as_secs(), "tronlink authorization timed out");
            }
        });
    }

    /// Claims the pending slot, switches apps and suspends until a callback or the timeout.
    async fn dispatch(&self, intent: TronLinkIntent) -> TransactionResult {
        let inner = &self.inner;
        let url = match intent.to_deep_link(&inner.config.url_scheme).and_then(|link| {
            Url::parse(&link).map_err(|_| WalletProviderError::EncodingError)
        }) {
            Ok(url) => url,
            Err(e) => return TransactionResult::Failed(e),
        };
        if !inner.launcher.can_open(&url) {
            return TransactionResult::Failed(Self::not_installed());
        }

        let ticket = match inner.pending.begin() {
            Ok(ticket) => ticket,
            Err(e) => return TransactionResult::Failed(e),
        };
        inner.pending.arm_timeout(ticket.id(), inner.config.transaction_timeout());

        if !inner.launcher.open(&url).await {
            warn!(action = intent.action.callback_path(), "could not open TronLink");
            inner.pending.resolve_id(ticket.id(), TransactionResult::Failed(Self::not_installed()));
        } else {
            info!(action = intent.action.callback_path(), request = ticket.id(), "switched to TronLink, waiting for callback");
        }
        ticket.wait().await
    }

    async fn handle_connect_callback(&self, callback: TronCallback) {
        let inner = &self.inner;
        if !inner.publisher.current().is_pending() {
            info!("connect callback without an authorization in flight, discarded");
            return;
        }

        let address = match (callback.result, callback.address) {
            (CallbackResult::Success, Some(address)) => address,
            (_, _) => {
                let message = callback.message.unwrap_or_else(|| "Authorization failed".to_string());
                inner.publisher.transition_if(ConnectionState::is_pending, ConnectionState::Error(message));
                return;
            }
        };
        if validate_tron_address(&address).is_err() {
            warn!(address = %short_address(&address), "TronLink returned an invalid address");
            inner.publisher.transition_if(
                ConnectionState::is_pending,
                ConnectionState::Error(WalletProviderError::InvalidAddress.to_string()),
            );
            return;
        }

        let session = WalletSession::new(
            uuid::Uuid::new_v4().to_string(),
            address,
            Network::Tron,
            TRONLINK_WALLET_NAME,
        );
        if let Err(e) = inner.vault.save(&session).await {
            warn!(error = %e, "failed to persist tronlink session");
        }
        let short = session.short_address();
        if inner
            .publisher
            .transition_if(ConnectionState::is_pending, ConnectionState::Connected(session))
            .is_some()
        {
            info!(address = %short, "tronlink session established");
        } else if let Err(e) = inner.vault.clear().await {
            warn!(error = %e, "failed to clear tronlink session");
        }
    }

    fn handle_transaction_callback(&self, callback: TronCallback) {
        let result = match callback.result {
            CallbackResult::Success => {
                TransactionResult::Success(callback.tx_hash.unwrap_or_else(|| PENDING_TX_HASH.to_string()))
            }
            CallbackResult::Fail => TransactionResult::Failed(WalletProviderError::TransactionFailed(
                callback.message.unwrap_or_else(|| "Transaction failed".to_string()),
            )),
            CallbackResult::Cancelled => TransactionResult::Rejected,
            CallbackResult::Unknown(raw) => TransactionResult::Failed(WalletProviderError::TransactionFailed(
                format!("Unknown callback result: {raw}"),
            )),
        };
        if !self.inner.pending.resolve(result) {
            info!(path = %callback.path, "tronlink callback after the request was settled, discarded");
        }
    }

    /// Connects with a fixed address, for demos without TronLink.
    #[cfg(any(test, feature = "test-env"))]
    pub async fn simulate_connection(&self) {
        let session = WalletSession::new(
            uuid::Uuid::new_v4().to_string(),
            "TN7oMgKp9K1rze4nHYdYzg1fFtoFkPDS3V",
            Network::Tron,
            TRONLINK_WALLET_NAME,
        );
        if let Err(e) = self.inner.vault.save(&session).await {
            warn!(error = %e, "failed to persist tronlink session");
        }
        self.inner.publisher.transition(ConnectionState::Connected(session));
    }
}

#[async_trait]
impl WalletConnectionProvider for TronLinkProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DeepLink
    }

    fn supported_networks(&self) -> Vec<Network> {
        vec![Network::Tron]
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
        ensure_supported(ProviderKind::DeepLink, network)?;
        let inner = &self.inner;
        if !self.is_wallet_installed() {
            let error = Self::not_installed();
            inner.publisher.transition(ConnectionState::Error(error.to_string()));
            return Err(error);
        }
        inner.publisher.transition(ConnectionState::Connecting);

        let link = TronLinkIntent::connect(&inner.config, &inner.app).to_deep_link(&inner.config.url_scheme)?;
        let url = match Url::parse(&link) {
            Ok(url) => url,
            Err(e) => {
                let message = format!("invalid deep link: {e}");
                inner.publisher.transition(ConnectionState::Error(message.clone()));
                return Err(WalletProviderError::ConnectionFailed(message));
            }
        };

        let generation = inner.publisher.transition(ConnectionState::WaitingForApproval(link));
        if !inner.launcher.open(&url).await {
            let error = Self::not_installed();
            inner.publisher.transition(ConnectionState::Error(error.to_string()));
            return Err(error);
        }
        self.spawn_connect_timeout(generation);
        info!("switched to TronLink, waiting for authorization");
        Ok(())
    }

    async fn disconnect(&self) {
        let inner = &self.inner;
        inner.pending.resolve(TransactionResult::Failed(WalletProviderError::NotConnected));
        if let Err(e) = inner.vault.clear().await {
            warn!(error = %e, "failed to clear tronlink session");
        }
        inner.publisher.transition(ConnectionState::Disconnected);
        info!("tronlink disconnected");
    }

    async fn send_transaction(&self, request: TransactionRequest) -> TransactionResult {
        if let Err(e) = self.connected_session() {
            return TransactionResult::Failed(e);
        }
        if let Err(e) = ensure_supported(ProviderKind::DeepLink, request.network)
            .and_then(|_| validate_tron_address(&request.to_address))
        {
            return TransactionResult::Failed(e);
        }
        let amount = match request.amount_in_smallest_unit() {
            Ok(amount) => amount,
            Err(e) => return TransactionResult::Failed(e),
        };
        let inner = &self.inner;
        self.dispatch(TronLinkIntent::transfer(&inner.config, &inner.app, &request.to_address, amount))
            .await
    }

    async fn approve(&self, request: ApproveRequest) -> TransactionResult {
        if let Err(e) = self.connected_session() {
            return TransactionResult::Failed(e);
        }
        if let Err(e) = ensure_supported(ProviderKind::DeepLink, request.network)
            .and_then(|_| validate_tron_address(&request.spender_address))
        {
            return TransactionResult::Failed(e);
        }
        let amount = match request.amount_in_smallest_unit() {
            Ok(amount) => amount,
            Err(e) => return TransactionResult::Failed(e),
        };
        let inner = &self.inner;
        self.dispatch(TronLinkIntent::approve(&inner.config, &inner.app, &request.spender_address, amount))
            .await
    }

    async fn restore_session(&self) -> bool {
        let inner = &self.inner;
        let session = match inner.vault.load().await {
            Ok(Some(session)) => session,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "failed to load tronlink session");
                return false;
            }
        };

        let usable = session.network == Network::Tron
            && !session.is_expired(Utc::now(), inner.config.session_max_age())
            && self.is_wallet_installed();
        if !usable {
            info!("stored tronlink session is no longer usable, discarding");
            if let Err(e) = inner.vault.clear().await {
                warn!(error = %e, "failed to clear tronlink session");
            }
            return false;
        }

        info!(address = %session.short_address(), "tronlink session restored");
        inner.publisher.transition(ConnectionState::Connected(session));
        true
    }

    async fn cancel(&self) {
        if self
            .inner
            .publisher
            .transition_if(ConnectionState::is_pending, ConnectionState::Disconnected)
            .is_some()
        {
            info!("tronlink authorization cancelled");
        }
    }

    async fn handle_callback(&self, url: &Url) -> bool {
        let Some(callback) = TronCallback::parse(url) else {
            return false;
        };
        debug!(path = %callback.path, result = ?callback.result, "tronlink callback received");
        let path = callback.path.clone();
        match path.as_str() {
            "connect" => self.handle_connect_callback(callback).await,
            "transfer" | "approve" => self.handle_transaction_callback(callback),
            other => {
                warn!(path = other, "unknown tronlink callback path");
                return false;
            }
        }
        true
    }

    fn is_wallet_installed(&self) -> bool {
        Url::parse(&self.inner.config.url_scheme).is_ok_and(|url| self.inner.launcher.can_open(&url))
    }
}
