//! 配对 URI
//!
//! `wc:{topic}@2?relay-protocol={relay}&symKey={hex}`. The topic is the SHA-256 of the
//! symmetric key, so both sides derive it from the key alone.

use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

use crate::core::errors::WalletProviderError;

pub const PAIRING_VERSION: u8 = 2;
const SYM_KEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingUri {
    pub topic: String,
    pub sym_key: String,
    pub relay_protocol: String,
}

impl PairingUri {
    /// Fresh random key and its derived topic.
    pub fn generate(relay_protocol: &str) -> Self {
        let mut key = [0u8; SYM_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self::from_sym_key(&key, relay_protocol)
    }

    pub fn from_sym_key(key: &[u8; SYM_KEY_LEN], relay_protocol: &str) -> Self {
        Self {
            topic: hex::encode(Sha256::digest(key)),
            sym_key: hex::encode(key),
            relay_protocol: relay_protocol.to_string(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, WalletProviderError> {
        let invalid = |why: &str| WalletProviderError::ConnectionFailed(format!("invalid pairing uri: {why}"));

        let url = Url::parse(raw).map_err(|_| invalid("not a uri"))?;
        if url.scheme() != "wc" {
            return Err(invalid("scheme must be wc"));
        }
        let (topic, version) = url.path().split_once('@').ok_or_else(|| invalid("missing version"))?;
        if version != PAIRING_VERSION.to_string() {
            return Err(invalid("unsupported version"));
        }
        if topic.is_empty() {
            return Err(invalid("empty topic"));
        }

        let mut relay_protocol = None;
        let mut sym_key = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "relay-protocol" => relay_protocol = Some(value.into_owned()),
                "symKey" => sym_key = Some(value.into_owned()),
                _ => {}
            }
        }
        let sym_key = sym_key.ok_or_else(|| invalid("missing symKey"))?;
        match hex::decode(&sym_key) {
            Ok(bytes) if bytes.len() == SYM_KEY_LEN => {}
            _ => return Err(invalid("symKey must be 32 hex-encoded bytes")),
        }

        Ok(Self {
            topic: topic.to_string(),
            sym_key,
            relay_protocol: relay_protocol.ok_or_else(|| invalid("missing relay-protocol"))?,
        })
    }
}

impl fmt::Display for PairingUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wc:{}@{}?relay-protocol={}&symKey={}",
            self.topic, PAIRING_VERSION, self.relay_protocol, self.sym_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_and_topic_derivation() {
        let uri = PairingUri::from_sym_key(&[7u8; 32], "irn");
        let s = uri.to_string();
        assert!(s.starts_with(&format!("wc:{}@2?relay-protocol=irn&symKey=", uri.topic)));
        assert!(s.ends_with(&"07".repeat(32)));
        assert_eq!(uri.topic, hex::encode(Sha256::digest([7u8; 32])));
        assert_eq!(PairingUri::parse(&s).unwrap(), uri);
    }

    #[test]
    fn test_generate_is_random() {
        let a = PairingUri::generate("irn");
        let b = PairingUri::generate("irn");
        assert_ne!(a.sym_key, b.sym_key);
        assert_eq!(a.topic.len(), 64);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PairingUri::parse("https://example.com").is_err());
        assert!(PairingUri::parse("wc:abc@1?relay-protocol=irn&symKey=00").is_err());
        assert!(PairingUri::parse("wc:abc@2?relay-protocol=irn&symKey=00").is_err());
        assert!(PairingUri::parse(&format!("wc:abc@2?symKey={}", "00".repeat(32))).is_err());
    }
}
