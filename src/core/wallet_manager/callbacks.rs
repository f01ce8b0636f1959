//! Inbound deep-link routing.

use tracing::{debug, warn};
use url::Url;

use super::WalletManager;
use crate::provider::evm::CALLBACK_HOSTS;
use crate::provider::tron::CALLBACK_HOST as TRON_CALLBACK_HOST;
use crate::provider::WalletConnectionProvider;

impl WalletManager {
    /// Hands a URL the app was opened with to the provider it belongs to.
    ///
    /// Routed by host: `tronlink` to the TRON provider, `wc`/`walletconnect` to the EVM
    /// provider, anything else is offered to both. Returns whether a provider consumed it.
    pub async fn handle_deep_link_callback(&self, raw: &str) -> bool {
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "unparseable callback url ignored");
                return false;
            }
        };
        debug!(scheme = url.scheme(), host = url.host_str().unwrap_or_default(), "deep link callback");

        match url.host_str() {
            Some(TRON_CALLBACK_HOST) => self.tron.handle_callback(&url).await,
            Some(host) if CALLBACK_HOSTS.contains(&host) => self.evm.handle_callback(&url).await,
            _ => {
                let evm = self.evm.handle_callback(&url).await;
                let tron = self.tron.handle_callback(&url).await;
                evm || tron
            }
        }
    }
}
