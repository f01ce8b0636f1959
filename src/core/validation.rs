//! 地址校验
//!
//! Address checks run before any payload is built or any app switch happens.

use once_cell::sync::Lazy;
use regex::Regex;
use sha3::{Digest, Keccak256};

use crate::core::errors::WalletProviderError;
use crate::network::{lookup, Network, ProtocolFamily};

static EVM_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("Hardcoded regex should always compile"));

/// TRON base58check addresses are always 34 characters.
pub const TRON_ADDRESS_LEN: usize = 34;

/// Validates an Ethereum-style address.
pub fn validate_ethereum_address(address: &str) -> Result<(), WalletProviderError> {
    if !EVM_ADDRESS.is_match(address) {
        return Err(WalletProviderError::InvalidAddress);
    }
    // EIP-55: if mixed-case, enforce checksum. All-lower or all-upper acceptable for compatibility.
    let body = &address[2..];
    let is_all_lower = !body.chars().any(|c| c.is_ascii_uppercase());
    let is_all_upper = !body.chars().any(|c| c.is_ascii_lowercase());
    if is_all_lower || is_all_upper || is_eip55_checksum_valid(address) {
        Ok(())
    } else {
        Err(WalletProviderError::InvalidAddress)
    }
}

fn is_eip55_checksum_valid(addr: &str) -> bool {
    let body = &addr[2..];
    let mut keccak = Keccak256::new();
    keccak.update(body.to_lowercase().as_bytes());
    let hash = keccak.finalize();
    body.chars().enumerate().all(|(i, ch)| {
        let nibble = (hash[i / 2] >> (4 * (1 - (i % 2)))) & 0x0f;
        match ch {
            'a'..='f' => nibble < 8,
            'A'..='F' => nibble >= 8,
            _ => true,
        }
    })
}

/// Validates a TRON address: 34 characters, network prefix, Base58 alphabet only.
pub fn validate_tron_address(address: &str) -> Result<(), WalletProviderError> {
    if address.len() != TRON_ADDRESS_LEN {
        return Err(WalletProviderError::InvalidAddress);
    }
    let prefix = lookup(Network::Tron).address_prefix;
    if prefix.is_some_and(|p| !address.starts_with(p)) {
        return Err(WalletProviderError::InvalidAddress);
    }
    bs58::decode(address)
        .into_vec()
        .map(|_| ())
        .map_err(|_| WalletProviderError::InvalidAddress)
}

/// Validates an address for the protocol family of `network`.
pub fn validate_address(address: &str, network: Network) -> Result<(), WalletProviderError> {
    match network.family() {
        ProtocolFamily::Evm => validate_ethereum_address(address),
        ProtocolFamily::Tron => validate_tron_address(address),
    }
}
