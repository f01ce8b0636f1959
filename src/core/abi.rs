//! ERC-20 call data encoding.
//!
//! Only the two calls a payment flow needs: `transfer(address,uint256)` and
//! `approve(address,uint256)`. Amounts are already in the token's smallest unit.

use sha3::{Digest, Keccak256};

use crate::core::errors::WalletProviderError;

/// `keccak256("transfer(address,uint256)")[..4]`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
/// `keccak256("approve(address,uint256)")[..4]`
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

/// 2^256 - 1, used for unlimited approvals.
pub const UINT256_MAX_WORD: [u8; 32] = [0xff; 32];

/// Compute the first 4 bytes (function selector) from a signature string, e.g. "transfer(address,uint256)".
pub fn selector_from_signature(signature: &str) -> [u8; 4] {
    let mut keccak = Keccak256::new();
    keccak.update(signature.as_bytes());
    let out = keccak.finalize();
    [out[0], out[1], out[2], out[3]]
}

/// Encode a 20-byte hex address (with or without 0x) into a left-padded 32-byte word.
pub fn abi_word_address(addr_hex: &str) -> Result<[u8; 32], WalletProviderError> {
    let addr = addr_hex.strip_prefix("0x").unwrap_or(addr_hex);
    if addr.len() != 40 {
        return Err(WalletProviderError::InvalidAddress);
    }
    let bytes = hex::decode(addr).map_err(|_| WalletProviderError::InvalidAddress)?;
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(&bytes);
    Ok(out)
}

/// Big-endian uint256 word from an integer that fits in 128 bits.
pub fn abi_word_uint256(value: u128) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[16..].copy_from_slice(&value.to_be_bytes());
    out
}

/// Pack a selector and ABI words contiguously into calldata.
pub fn abi_pack(selector: [u8; 4], words: &[[u8; 32]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 32 * words.len());
    out.extend_from_slice(&selector);
    for w in words {
        out.extend_from_slice(w);
    }
    out
}

pub fn encode_transfer(to: &str, amount: u128) -> Result<Vec<u8>, WalletProviderError> {
    let to = abi_word_address(to)?;
    Ok(abi_pack(TRANSFER_SELECTOR, &[to, abi_word_uint256(amount)]))
}

/// `amount == None` encodes an unlimited allowance.
pub fn encode_approve(spender: &str, amount: Option<u128>) -> Result<Vec<u8>, WalletProviderError> {
    let spender = abi_word_address(spender)?;
    let amount = amount.map(abi_word_uint256).unwrap_or(UINT256_MAX_WORD);
    Ok(abi_pack(APPROVE_SELECTOR, &[spender, amount]))
}

/// `0x`-prefixed lowercase hex, the form wallets expect in `data`.
pub fn to_hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}
