//! Static description of every supported chain.
//!
//! Pure data: one [`NetworkInfo`] row per [`Network`], looked up by a total `match`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Connection protocol family. Decides which provider may serve a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolFamily {
    /// Ethereum-compatible chains, served over the out-of-band pairing channel.
    Evm,
    /// TRON, served over app-switch deep links.
    Tron,
}

/// Supported blockchain networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    #[serde(rename = "Ethereum")]
    Ethereum,
    #[serde(rename = "BSC")]
    Bsc,
    #[serde(rename = "Polygon")]
    Polygon,
    #[serde(rename = "TRON")]
    Tron,
}

/// Registry row for one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub network: Network,
    pub family: ProtocolFamily,
    /// EVM chain id, `None` for TRON.
    pub chain_id: Option<u64>,
    /// CAIP-2 chain reference, e.g. `eip155:1`.
    pub caip2: &'static str,
    pub display_name: &'static str,
    pub usdt_contract: &'static str,
    pub usdt_decimals: u32,
    pub explorer_base_url: &'static str,
    /// Transaction page template, `{base}` and `{hash}` are substituted.
    pub explorer_tx_template: &'static str,
    /// Fixed leading character of every address on this network, if any.
    pub address_prefix: Option<char>,
    pub icon_name: &'static str,
    pub brand_color: u32,
}

const USDT_DECIMALS: u32 = 6;

static ETHEREUM: NetworkInfo = NetworkInfo {
    network: Network::Ethereum,
    family: ProtocolFamily::Evm,
    chain_id: Some(1),
    caip2: "eip155:1",
    display_name: "Ethereum",
    usdt_contract: "0xdAC17F958D2ee523a2206206994597C13D831ec7",
    usdt_decimals: USDT_DECIMALS,
    explorer_base_url: "https://etherscan.io",
    explorer_tx_template: "{base}/tx/{hash}",
    address_prefix: None,
    icon_name: "diamond.fill",
    brand_color: 0x627EEA,
};

static BSC: NetworkInfo = NetworkInfo {
    network: Network::Bsc,
    family: ProtocolFamily::Evm,
    chain_id: Some(56),
    caip2: "eip155:56",
    display_name: "BSC",
    usdt_contract: "0x55d398326f99059fF775485246999027B3197955",
    usdt_decimals: USDT_DECIMALS,
    explorer_base_url: "https://bscscan.com",
    explorer_tx_template: "{base}/tx/{hash}",
    address_prefix: None,
    icon_name: "circle.hexagongrid.fill",
    brand_color: 0xF3BA2F,
};

static POLYGON: NetworkInfo = NetworkInfo {
    network: Network::Polygon,
    family: ProtocolFamily::Evm,
    chain_id: Some(137),
    caip2: "eip155:137",
    display_name: "Polygon",
    usdt_contract: "0xc2132D05D31c914a87C6611C10748AEb04B58e8F",
    usdt_decimals: USDT_DECIMALS,
    explorer_base_url: "https://polygonscan.com",
    explorer_tx_template: "{base}/tx/{hash}",
    address_prefix: None,
    icon_name: "pentagon.fill",
    brand_color: 0x8247E5,
};

static TRON: NetworkInfo = NetworkInfo {
    network: Network::Tron,
    family: ProtocolFamily::Tron,
    chain_id: None,
    caip2: "tron:mainnet",
    display_name: "TRON",
    usdt_contract: "TR7NHqjeKQxGTCi8q282RJWC3SVrFoJypL",
    usdt_decimals: USDT_DECIMALS,
    explorer_base_url: "https://tronscan.org",
    explorer_tx_template: "{base}/#/transaction/{hash}",
    address_prefix: Some('T'),
    icon_name: "bolt.fill",
    brand_color: 0xEB0029,
};

/// Registry lookup. Total over [`Network`].
pub fn lookup(network: Network) -> &'static NetworkInfo {
    match network {
        Network::Ethereum => &ETHEREUM,
        Network::Bsc => &BSC,
        Network::Polygon => &POLYGON,
        Network::Tron => &TRON,
    }
}

impl Network {
    pub const ALL: [Network; 4] = [Network::Ethereum, Network::Bsc, Network::Polygon, Network::Tron];

    pub fn info(self) -> &'static NetworkInfo {
        lookup(self)
    }

    pub fn family(self) -> ProtocolFamily {
        lookup(self).family
    }

    pub fn chain_id(self) -> Option<u64> {
        lookup(self).chain_id
    }

    pub fn is_evm(self) -> bool {
        self.family() == ProtocolFamily::Evm
    }

    /// Display name, also the persisted identifier.
    pub fn name(self) -> &'static str {
        lookup(self).display_name
    }

    pub fn evm_chains() -> Vec<Network> {
        Self::ALL.iter().copied().filter(|n| n.is_evm()).collect()
    }

    /// Maps an EVM chain id back to a known network.
    pub fn from_chain_id(chain_id: u64) -> Option<Network> {
        Self::ALL.iter().copied().find(|n| n.chain_id() == Some(chain_id))
    }
}

impl NetworkInfo {
    /// Block explorer page for a transaction hash.
    pub fn explorer_url(&self, tx_hash: &str) -> String {
        self.explorer_tx_template
            .replace("{base}", self.explorer_base_url)
            .replace("{hash}", tx_hash)
    }

    /// Chain id as `0x`-prefixed hex, the form `eth_sendTransaction` expects.
    pub fn chain_id_hex(&self) -> Option<String> {
        self.chain_id.map(|id| format!("0x{:x}", id))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Ok(Network::Ethereum),
            "bsc" | "bnb" => Ok(Network::Bsc),
            "polygon" | "matic" => Ok(Network::Polygon),
            "tron" | "trx" => Ok(Network::Tron),
            other => Err(format!("Unknown network: {}", other)),
        }
    }
}
