//! TronLink 深度链接协议
//!
//! Outbound: `{scheme}pull.activity?param={urlencoded JSON intent}`.
//! Inbound: `{app}://tronlink/{connect|transfer|approve}?result=...&address=...&txHash=...&message=...`.

use serde::Serialize;
use url::Url;

use crate::core::config::{AppConfig, TronLinkConfig};
use crate::core::errors::WalletProviderError;
use crate::network::{lookup, Network};

pub const CALLBACK_HOST: &str = "tronlink";
const TOKEN_TYPE: &str = "trc20";
/// 2^256 - 1 in decimal, the unlimited allowance.
pub const UINT256_MAX_DECIMAL: &str =
    "115792089237316195423570985008687907853269984665640564039457584007913129639935";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TronAction {
    Authorization,
    Transfer,
    Approve,
}

impl TronAction {
    /// Path segment of the callback URL for this action.
    pub fn callback_path(self) -> &'static str {
        match self {
            TronAction::Authorization => "connect",
            TronAction::Transfer => "transfer",
            TronAction::Approve => "approve",
        }
    }
}

/// JSON payload handed to the wallet app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TronLinkIntent {
    pub url: String,
    pub action: TronAction,
    pub protocol: String,
    pub version: String,
    pub dapp_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dapp_icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spender_address: Option<String>,
    /// Smallest-unit integer as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl TronLinkIntent {
    fn base(action: TronAction, config: &TronLinkConfig, app: &AppConfig) -> Self {
        Self {
            url: app.callback_url(CALLBACK_HOST, action.callback_path()),
            action,
            protocol: config.protocol.clone(),
            version: config.version.clone(),
            dapp_name: app.dapp_name.clone(),
            dapp_icon: None,
            to_address: None,
            spender_address: None,
            amount: None,
            token_type: None,
            contract_address: None,
            memo: None,
        }
    }

    pub fn connect(config: &TronLinkConfig, app: &AppConfig) -> Self {
        Self { dapp_icon: Some(app.icon_url.clone()), ..Self::base(TronAction::Authorization, config, app) }
    }

    pub fn transfer(config: &TronLinkConfig, app: &AppConfig, to_address: &str, amount: u128) -> Self {
        Self {
            to_address: Some(to_address.to_string()),
            amount: Some(amount.to_string()),
            token_type: Some(TOKEN_TYPE.to_string()),
            contract_address: Some(lookup(Network::Tron).usdt_contract.to_string()),
            memo: config.memo.clone(),
            ..Self::base(TronAction::Transfer, config, app)
        }
    }

    /// `amount == None` requests an unlimited allowance.
    pub fn approve(config: &TronLinkConfig, app: &AppConfig, spender: &str, amount: Option<u128>) -> Self {
        Self {
            spender_address: Some(spender.to_string()),
            amount: Some(amount.map_or_else(|| UINT256_MAX_DECIMAL.to_string(), |a| a.to_string())),
            token_type: Some(TOKEN_TYPE.to_string()),
            contract_address: Some(lookup(Network::Tron).usdt_contract.to_string()),
            ..Self::base(TronAction::Approve, config, app)
        }
    }

    pub fn to_deep_link(&self, scheme: &str) -> Result<String, WalletProviderError> {
        let json = serde_json::to_string(self).map_err(|_| WalletProviderError::EncodingError)?;
        Ok(format!("{}pull.activity?param={}", scheme, urlencoding::encode(&json)))
    }
}

/// `result` query value of a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    Success,
    Fail,
    Cancelled,
    Unknown(String),
}

impl CallbackResult {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("success") => CallbackResult::Success,
            Some("fail") => CallbackResult::Fail,
            Some("cancel") | Some("rejected") => CallbackResult::Cancelled,
            Some(other) => CallbackResult::Unknown(other.to_string()),
            None => CallbackResult::Unknown(String::new()),
        }
    }
}

/// A parsed inbound callback addressed to the TronLink host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TronCallback {
    /// Path without the leading slash, e.g. `transfer`.
    pub path: String,
    pub result: CallbackResult,
    pub address: Option<String>,
    pub tx_hash: Option<String>,
    pub message: Option<String>,
}

impl TronCallback {
    /// `None` unless the URL's host is the TronLink callback host.
    pub fn parse(url: &Url) -> Option<Self> {
        if url.host_str() != Some(CALLBACK_HOST) {
            return None;
        }
        let mut result = None;
        let mut address = None;
        let mut tx_hash = None;
        let mut txid = None;
        let mut message = None;
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "result" => result = value,
                "address" => address = value,
                "txHash" => tx_hash = value,
                "txid" => txid = value,
                "message" => message = value,
                _ => {}
            }
        }
        Some(Self {
            path: url.path().trim_start_matches('/').to_string(),
            result: CallbackResult::parse(result.as_deref()),
            address,
            tx_hash: tx_hash.or(txid),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    fn decode_param(link: &str) -> serde_json::Value {
        let url = Url::parse(link).unwrap();
        let param = url.query_pairs().find(|(k, _)| k == "param").unwrap().1.into_owned();
        serde_json::from_str(&param).unwrap()
    }

    #[test]
    fn test_connect_intent() {
        let link = TronLinkIntent::connect(&TronLinkConfig::default(), &AppConfig::default())
            .to_deep_link("tronlinkoutside://")
            .unwrap();
        assert!(link.starts_with("tronlinkoutside://pull.activity?param="));
        assert_eq!(
            decode_param(&link),
            json!({
                "url": "epusdtpay://tronlink/connect",
                "action": "authorization",
                "protocol": "TronLink",
                "version": "1.0",
                "dappName": "Epusdt Pay",
                "dappIcon": "https://epusdt.com/icon.png",
            })
        );
    }

    #[test]
    fn test_transfer_intent() {
        let mut config = TronLinkConfig::default();
        config.memo = Some("order 42".into());
        let intent = TronLinkIntent::transfer(&config, &AppConfig::default(), "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7", 12_500_000);
        let value = decode_param(&intent.to_deep_link(&config.url_scheme).unwrap());
        assert_eq!(value["action"], "transfer");
        assert_eq!(value["url"], "epusdtpay://tronlink/transfer");
        assert_eq!(value["amount"], "12500000");
        assert_eq!(value["tokenType"], "trc20");
        assert_eq!(value["contractAddress"], "TR7NHqjeKQxGTCi8q282RJWC3SVrFoJypL");
        assert_eq!(value["memo"], "order 42");
        assert!(value.get("spenderAddress").is_none());
    }

    #[test]
    fn test_unlimited_approve_intent() {
        let intent = TronLinkIntent::approve(
            &TronLinkConfig::default(),
            &AppConfig::default(),
            "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7",
            None,
        );
        assert_eq!(intent.amount.as_deref(), Some(UINT256_MAX_DECIMAL));
        assert_eq!(intent.url, "epusdtpay://tronlink/approve");
        assert!(intent.memo.is_none());
    }

    #[test_case("epusdtpay://tronlink/transfer?result=success&txHash=abc", CallbackResult::Success, Some("abc") ; "tx hash")]
    #[test_case("epusdtpay://tronlink/transfer?result=success&txid=def", CallbackResult::Success, Some("def") ; "txid alias")]
    #[test_case("epusdtpay://tronlink/approve?result=success", CallbackResult::Success, None ; "no hash")]
    #[test_case("epusdtpay://tronlink/transfer?result=cancel", CallbackResult::Cancelled, None ; "cancel")]
    #[test_case("epusdtpay://tronlink/transfer?result=rejected", CallbackResult::Cancelled, None ; "rejected")]
    #[test_case("epusdtpay://tronlink/transfer?result=weird", CallbackResult::Unknown("weird".into()), None ; "unknown")]
    fn test_parse_callback(raw: &str, result: CallbackResult, hash: Option<&str>) {
        let callback = TronCallback::parse(&Url::parse(raw).unwrap()).unwrap();
        assert_eq!(callback.result, result);
        assert_eq!(callback.tx_hash.as_deref(), hash);
    }

    #[test]
    fn test_parse_ignores_other_hosts() {
        assert!(TronCallback::parse(&Url::parse("epusdtpay://wc/return").unwrap()).is_none());
    }

    #[test]
    fn test_parse_fail_message() {
        let url = Url::parse("epusdtpay://tronlink/connect?result=fail&message=denied%20by%20user").unwrap();
        let callback = TronCallback::parse(&url).unwrap();
        assert_eq!(callback.path, "connect");
        assert_eq!(callback.result, CallbackResult::Fail);
        assert_eq!(callback.message.as_deref(), Some("denied by user"));
    }
}
