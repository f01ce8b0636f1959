//! 会话与请求模型
//!
//! Value types shared by both providers and the manager.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::abi;
use crate::core::errors::WalletProviderError;
use crate::network::{lookup, Network};

/// A live link to an external wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSession {
    pub id: String,
    pub address: String,
    pub network: Network,
    pub wallet_name: String,
    #[serde(rename = "connectedAtTimestamp", with = "chrono::serde::ts_seconds")]
    pub connected_at: DateTime<Utc>,
}

impl WalletSession {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        network: Network,
        wallet_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            network,
            wallet_name: wallet_name.into(),
            connected_at: Utc::now(),
        }
    }

    /// `0x1234...abcd` form for display and logs.
    pub fn short_address(&self) -> String {
        short_address(&self.address)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.connected_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }
}

/// First 6 and last 4 characters; short strings are returned unchanged.
pub fn short_address(address: &str) -> String {
    if address.len() <= 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Connection state of one provider, mirrored once by the manager.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    /// Carries the pairing URI or deep link shown to the user.
    WaitingForApproval(String),
    Connected(WalletSession),
    Error(String),
}

impl ConnectionState {
    /// Present if and only if the state is `Connected`.
    pub fn session(&self) -> Option<&WalletSession> {
        match self {
            ConnectionState::Connected(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }

    /// A connection attempt is in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::WaitingForApproval(_))
    }

    pub fn pairing_payload(&self) -> Option<&str> {
        match self {
            ConnectionState::WaitingForApproval(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ConnectionState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Converts a token amount to its integer smallest unit without rounding.
///
/// Negative amounts, amounts with more fractional digits than `decimals` and
/// amounts that overflow 128 bits are rejected with `EncodingError`.
pub fn to_smallest_unit(amount: Decimal, decimals: u32) -> Result<u128, WalletProviderError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(WalletProviderError::EncodingError);
    }
    let factor = 10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or(WalletProviderError::EncodingError)?;
    let scaled = amount.checked_mul(factor).ok_or(WalletProviderError::EncodingError)?;
    if !scaled.fract().is_zero() {
        return Err(WalletProviderError::EncodingError);
    }
    scaled.trunc().to_u128().ok_or(WalletProviderError::EncodingError)
}

fn require_evm(network: Network) -> Result<(), WalletProviderError> {
    if network.is_evm() {
        Ok(())
    } else {
        Err(WalletProviderError::UnsupportedNetwork)
    }
}

/// USDT transfer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to_address: String,
    pub amount: Decimal,
    pub network: Network,
}

impl TransactionRequest {
    pub fn new(to_address: impl Into<String>, amount: Decimal, network: Network) -> Self {
        Self { to_address: to_address.into(), amount, network }
    }

    pub fn amount_in_smallest_unit(&self) -> Result<u128, WalletProviderError> {
        to_smallest_unit(self.amount, lookup(self.network).usdt_decimals)
    }

    /// `transfer(address,uint256)` call data. EVM networks only.
    pub fn call_data(&self) -> Result<Vec<u8>, WalletProviderError> {
        require_evm(self.network)?;
        abi::encode_transfer(&self.to_address, self.amount_in_smallest_unit()?)
    }

    pub fn call_data_hex(&self) -> Result<String, WalletProviderError> {
        self.call_data().map(|data| abi::to_hex_data(&data))
    }
}

/// Allowance granted by an approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproveAmount {
    Limited(Decimal),
    /// 2^256 - 1
    Unlimited,
}

/// USDT approval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveRequest {
    pub spender_address: String,
    pub amount: ApproveAmount,
    pub network: Network,
}

impl ApproveRequest {
    pub fn new(spender_address: impl Into<String>, amount: ApproveAmount, network: Network) -> Self {
        Self { spender_address: spender_address.into(), amount, network }
    }

    /// `None` for an unlimited approval.
    pub fn amount_in_smallest_unit(&self) -> Result<Option<u128>, WalletProviderError> {
        match self.amount {
            ApproveAmount::Limited(amount) => {
                to_smallest_unit(amount, lookup(self.network).usdt_decimals).map(Some)
            }
            ApproveAmount::Unlimited => Ok(None),
        }
    }

    /// `approve(address,uint256)` call data. EVM networks only.
    pub fn call_data(&self) -> Result<Vec<u8>, WalletProviderError> {
        require_evm(self.network)?;
        abi::encode_approve(&self.spender_address, self.amount_in_smallest_unit()?)
    }

    pub fn call_data_hex(&self) -> Result<String, WalletProviderError> {
        self.call_data().map(|data| abi::to_hex_data(&data))
    }
}

/// Outcome of one send or approve call. Exactly one per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionResult {
    Success(String),
    Rejected,
    Failed(WalletProviderError),
}

impl TransactionResult {
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            TransactionResult::Success(hash) => Some(hash),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransactionResult::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_short_address() {
        assert_eq!(short_address("0x1111111111111111111111111111111111111111"), "0x1111...1111");
        assert_eq!(short_address("TR7NHqjeKQxGTCi8q282RJWC3SVrFoJypL"), "TR7NHq...JypL");
        assert_eq!(short_address("0x12345678"), "0x12345678");
    }

    #[test]
    fn test_smallest_unit_is_exact() {
        assert_eq!(to_smallest_unit(dec("12.5"), 6), Ok(12_500_000));
        assert_eq!(to_smallest_unit(dec("0.000001"), 6), Ok(1));
        assert_eq!(to_smallest_unit(dec("100"), 6), Ok(100_000_000));
        assert_eq!(to_smallest_unit(dec("0"), 6), Ok(0));
    }

    #[test]
    fn test_smallest_unit_rejects_lossy_amounts() {
        assert_eq!(to_smallest_unit(dec("0.0000001"), 6), Err(WalletProviderError::EncodingError));
        assert_eq!(to_smallest_unit(dec("-1"), 6), Err(WalletProviderError::EncodingError));
    }

    #[test]
    fn test_transfer_request_call_data() {
        let req = TransactionRequest::new(
            "0x2222222222222222222222222222222222222222",
            dec("12.5"),
            Network::Ethereum,
        );
        let hex = req.call_data_hex().unwrap();
        assert_eq!(
            hex,
            format!("0xa9059cbb{}{}{:0>64}", "0".repeat(24), "2".repeat(40), "bebc20")
        );
    }

    #[test]
    fn test_call_data_needs_evm_network() {
        let req = TransactionRequest::new("TR7NHqjeKQxGTCi8q282RJWC3SVrFoJypL", dec("1"), Network::Tron);
        assert_eq!(req.call_data(), Err(WalletProviderError::UnsupportedNetwork));
        assert_eq!(req.amount_in_smallest_unit(), Ok(1_000_000));
    }

    #[test]
    fn test_unlimited_approve() {
        let req = ApproveRequest::new(
            "0x3333333333333333333333333333333333333333",
            ApproveAmount::Unlimited,
            Network::Bsc,
        );
        assert_eq!(req.amount_in_smallest_unit(), Ok(None));
        assert!(req.call_data_hex().unwrap().starts_with("0x095ea7b3"));
        assert!(req.call_data_hex().unwrap().ends_with(&"f".repeat(64)));
    }

    #[test]
    fn test_session_state_accessors() {
        let session = WalletSession::new("s1", "0xabc", Network::Polygon, "MetaMask");
        let connected = ConnectionState::Connected(session.clone());
        assert_eq!(connected.session(), Some(&session));
        assert!(ConnectionState::WaitingForApproval("wc:x".into()).session().is_none());
        assert!(ConnectionState::Connecting.is_pending());
        assert_eq!(ConnectionState::Error("boom".into()).error_message(), Some("boom"));
    }

    #[test]
    fn test_session_record_format() {
        let mut session = WalletSession::new("topic", "0xabc", Network::Bsc, "Trust Wallet");
        session.connected_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "topic",
                "address": "0xabc",
                "network": "BSC",
                "walletName": "Trust Wallet",
                "connectedAtTimestamp": 1_700_000_000i64,
            })
        );
        let back: WalletSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn test_session_expiry() {
        let mut session = WalletSession::new("s", "a", Network::Ethereum, "w");
        let now = Utc::now();
        session.connected_at = now - Duration::hours(25);
        assert!(session.is_expired(now, Duration::hours(24)));
        assert!(!session.is_expired(now, Duration::hours(26)));
    }
}
