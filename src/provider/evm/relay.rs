//! Messages exchanged over the pairing relay, and the relay seam itself.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::pairing::PairingUri;
use crate::core::config::AppConfig;
use crate::core::domain::TransactionResult;
use crate::core::errors::WalletProviderError;
use crate::network::Network;

pub const EIP155_NAMESPACE: &str = "eip155";
pub const METHOD_SEND_TRANSACTION: &str = "eth_sendTransaction";
const REQUIRED_METHODS: [&str; 3] = [METHOD_SEND_TRANSACTION, "personal_sign", "eth_signTypedData"];
const REQUIRED_EVENTS: [&str; 2] = ["chainChanged", "accountsChanged"];

/// JSON-RPC error codes wallets use for "user said no".
pub const USER_REJECTED_CODES: [i64; 2] = [4001, 5000];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DappMetadata {
    pub name: String,
    pub description: String,
    pub url: String,
    pub icons: Vec<String>,
    /// Native redirect the wallet uses to return to the app.
    pub redirect: String,
}

impl From<&AppConfig> for DappMetadata {
    fn from(app: &AppConfig) -> Self {
        Self {
            name: app.dapp_name.clone(),
            description: app.description.clone(),
            url: app.url.clone(),
            icons: vec![app.icon_url.clone()],
            redirect: format!("{}://", app.callback_scheme),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalNamespace {
    pub chains: Vec<String>,
    pub methods: Vec<String>,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProposal {
    pub pairing_topic: String,
    pub required_namespaces: BTreeMap<String, ProposalNamespace>,
    pub metadata: DappMetadata,
}

impl SessionProposal {
    pub fn new(uri: &PairingUri, network: Network, app: &AppConfig) -> Self {
        let namespace = ProposalNamespace {
            chains: vec![network.info().caip2.to_string()],
            methods: REQUIRED_METHODS.iter().map(|m| m.to_string()).collect(),
            events: REQUIRED_EVENTS.iter().map(|e| e.to_string()).collect(),
        };
        Self {
            pairing_topic: uri.topic.clone(),
            required_namespaces: BTreeMap::from([(EIP155_NAMESPACE.to_string(), namespace)]),
            metadata: DappMetadata::from(app),
        }
    }
}

/// `eth_sendTransaction` parameter object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthTransaction {
    pub from: String,
    pub to: String,
    pub data: String,
    pub chain_id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    pub topic: String,
    /// CAIP-2 chain the request targets.
    pub chain_id: String,
    pub method: String,
    pub params: Vec<EthTransaction>,
}

/// Wallet answer to a [`SignRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResponse {
    Success(String),
    Error { code: i64, message: String },
}

impl SessionResponse {
    /// Reads a JSON-RPC response body: `{"result": "0x.."}` or `{"error": {code, message}}`.
    pub fn from_rpc(value: &serde_json::Value) -> Option<Self> {
        if let Some(hash) = value.get("result").and_then(|r| r.as_str()) {
            return Some(SessionResponse::Success(hash.to_string()));
        }
        let error = value.get("error")?;
        Some(SessionResponse::Error {
            code: error.get("code").and_then(|c| c.as_i64()).unwrap_or_default(),
            message: error.get("message").and_then(|m| m.as_str()).unwrap_or_default().to_string(),
        })
    }

    pub fn is_user_rejection(&self) -> bool {
        match self {
            SessionResponse::Success(_) => false,
            SessionResponse::Error { code, message } => {
                USER_REJECTED_CODES.contains(code) || message.to_ascii_lowercase().contains("reject")
            }
        }
    }

    pub fn into_result(self) -> TransactionResult {
        if self.is_user_rejection() {
            return TransactionResult::Rejected;
        }
        match self {
            SessionResponse::Success(hash) if !hash.is_empty() => TransactionResult::Success(hash),
            SessionResponse::Success(_) => TransactionResult::Failed(WalletProviderError::TransactionFailed(
                "wallet returned an empty transaction hash".to_string(),
            )),
            SessionResponse::Error { message, .. } => {
                TransactionResult::Failed(WalletProviderError::TransactionFailed(message))
            }
        }
    }
}

/// Transport to the relay network. Responses and settle events come back through
/// [`super::EvmPairingProvider`]'s `handle_*` methods.
#[async_trait]
pub trait PairingRelay: Send + Sync {
    async fn propose_session(&self, proposal: &SessionProposal) -> Result<(), WalletProviderError>;

    async fn send_request(&self, request: &SignRequest) -> Result<(), WalletProviderError>;

    async fn disconnect(&self, topic: &str) -> Result<(), WalletProviderError>;
}

/// Relay that records outbound messages. Used headless and in tests.
#[derive(Debug, Default)]
pub struct RecordingRelay {
    proposals: Mutex<Vec<SessionProposal>>,
    requests: Mutex<Vec<SignRequest>>,
    disconnects: Mutex<Vec<String>>,
    failure: Mutex<Option<WalletProviderError>>,
}

impl RecordingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every following call fails with `error` until [`Self::clear_failure`].
    pub fn fail_with(&self, error: WalletProviderError) {
        *self.failure.lock() = Some(error);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    pub fn proposals(&self) -> Vec<SessionProposal> {
        self.proposals.lock().clone()
    }

    pub fn requests(&self) -> Vec<SignRequest> {
        self.requests.lock().clone()
    }

    pub fn disconnects(&self) -> Vec<String> {
        self.disconnects.lock().clone()
    }

    fn check(&self) -> Result<(), WalletProviderError> {
        match self.failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PairingRelay for RecordingRelay {
    async fn propose_session(&self, proposal: &SessionProposal) -> Result<(), WalletProviderError> {
        self.check()?;
        debug!(topic = %proposal.pairing_topic, "session proposal recorded");
        self.proposals.lock().push(proposal.clone());
        Ok(())
    }

    async fn send_request(&self, request: &SignRequest) -> Result<(), WalletProviderError> {
        self.check()?;
        debug!(method = %request.method, chain = %request.chain_id, "sign request recorded");
        self.requests.lock().push(request.clone());
        Ok(())
    }

    async fn disconnect(&self, topic: &str) -> Result<(), WalletProviderError> {
        // recorded even when failing, the attempt is what matters
        self.disconnects.lock().push(topic.to_string());
        self.check()
    }
}
