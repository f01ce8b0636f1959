//! 支持的钱包应用
//!
//! Metadata for the external wallet apps the UI can offer and switch to.

use crate::network::registry::Network;
use crate::provider::ProviderKind;

/// External wallet application metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAppInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub icon_name: &'static str,
    /// URL scheme probed for installation, e.g. `metamask://`.
    pub deep_link_scheme: &'static str,
    pub universal_link: Option<&'static str>,
    pub supported_networks: &'static [Network],
    pub provider_type: ProviderKind,
}

const EVM_NETWORKS: &[Network] = &[Network::Ethereum, Network::Bsc, Network::Polygon];

pub static SUPPORTED_WALLETS: [WalletAppInfo; 4] = [
    WalletAppInfo {
        id: "metamask",
        name: "MetaMask",
        icon_name: "m.circle.fill",
        deep_link_scheme: "metamask://",
        universal_link: Some("https://metamask.app.link"),
        supported_networks: EVM_NETWORKS,
        provider_type: ProviderKind::Pairing,
    },
    WalletAppInfo {
        id: "trust",
        name: "Trust Wallet",
        icon_name: "shield.checkered",
        deep_link_scheme: "trust://",
        universal_link: Some("https://link.trustwallet.com"),
        supported_networks: EVM_NETWORKS,
        provider_type: ProviderKind::Pairing,
    },
    WalletAppInfo {
        id: "tokenpocket",
        name: "TokenPocket",
        icon_name: "t.circle.fill",
        deep_link_scheme: "tpoutside://",
        universal_link: None,
        supported_networks: &Network::ALL,
        provider_type: ProviderKind::Pairing,
    },
    WalletAppInfo {
        id: "tronlink",
        name: "TronLink",
        icon_name: "bolt.circle.fill",
        deep_link_scheme: "tronlinkoutside://",
        universal_link: None,
        supported_networks: &[Network::Tron],
        provider_type: ProviderKind::DeepLink,
    },
];

/// Wallets usable on `network`.
pub fn wallets_for(network: Network) -> Vec<&'static WalletAppInfo> {
    SUPPORTED_WALLETS
        .iter()
        .filter(|w| w.supported_networks.contains(&network))
        .collect()
}

/// Wallets reached through the pairing channel.
pub fn pairing_wallets() -> Vec<&'static WalletAppInfo> {
    SUPPORTED_WALLETS
        .iter()
        .filter(|w| w.provider_type == ProviderKind::Pairing)
        .collect()
}

pub fn tron_wallets() -> Vec<&'static WalletAppInfo> {
    wallets_for(Network::Tron)
}

/// Finds a wallet by its display name, as stored in a session.
pub fn find_by_name(name: &str) -> Option<&'static WalletAppInfo> {
    SUPPORTED_WALLETS.iter().find(|w| w.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallets_for_network() {
        let eth: Vec<_> = wallets_for(Network::Ethereum).iter().map(|w| w.id).collect();
        assert_eq!(eth, vec!["metamask", "trust", "tokenpocket"]);

        let tron: Vec<_> = tron_wallets().iter().map(|w| w.id).collect();
        assert_eq!(tron, vec!["tokenpocket", "tronlink"]);
    }

    #[test]
    fn test_pairing_wallets_exclude_tronlink() {
        assert!(pairing_wallets().iter().all(|w| w.id != "tronlink"));
        assert_eq!(pairing_wallets().len(), 3);
    }

    #[test]
    fn test_find_by_name() {
        assert_eq!(find_by_name("MetaMask").map(|w| w.id), Some("metamask"));
        assert!(find_by_name("Phantom").is_none());
    }
}
