//! 钱包连接配置
//!
//! Every field has a serde default so a partial TOML file (or none at all) is valid.

use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_PROJECT_ID: &str = "WALLET_LINK_PROJECT_ID";
pub const ENV_CALLBACK_SCHEME: &str = "WALLET_LINK_CALLBACK_SCHEME";

/// Upper bound for `session_max_age_hours` (one year).
pub const MAX_SESSION_AGE_HOURS: i64 = 24 * 365;

fn session_age(hours: i64) -> ChronoDuration {
    ChronoDuration::try_hours(hours.clamp(0, MAX_SESSION_AGE_HOURS)).unwrap_or_else(ChronoDuration::zero)
}

/// Host application identity shown to wallets and used for callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Custom URL scheme wallets call back into, without `://`.
    #[serde(default = "AppConfig::default_callback_scheme")]
    pub callback_scheme: String,
    #[serde(default = "AppConfig::default_dapp_name")]
    pub dapp_name: String,
    #[serde(default = "AppConfig::default_description")]
    pub description: String,
    #[serde(default = "AppConfig::default_url")]
    pub url: String,
    #[serde(default = "AppConfig::default_icon_url")]
    pub icon_url: String,
}

impl AppConfig {
    fn default_callback_scheme() -> String { "epusdtpay".to_string() }
    fn default_dapp_name() -> String { "Epusdt Pay".to_string() }
    fn default_description() -> String { "USDT payment authorization".to_string() }
    fn default_url() -> String { "https://epusdt.com".to_string() }
    fn default_icon_url() -> String { "https://epusdt.com/icon.png".to_string() }

    /// `{scheme}://{host}/{path}`
    pub fn callback_url(&self, host: &str, path: &str) -> String {
        format!("{}://{}/{}", self.callback_scheme, host, path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            callback_scheme: Self::default_callback_scheme(),
            dapp_name: Self::default_dapp_name(),
            description: Self::default_description(),
            url: Self::default_url(),
            icon_url: Self::default_icon_url(),
        }
    }
}

/// Pairing channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConnectConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "WalletConnectConfig::default_relay_protocol")]
    pub relay_protocol: String,
    #[serde(default = "WalletConnectConfig::default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "WalletConnectConfig::default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "WalletConnectConfig::default_session_max_age")]
    pub session_max_age_hours: i64,
    #[serde(default = "WalletConnectConfig::default_storage_key")]
    pub storage_key: String,
}

impl WalletConnectConfig {
    fn default_relay_protocol() -> String { "irn".to_string() }
    fn default_connect_timeout() -> u64 { 120 }
    fn default_request_timeout() -> u64 { 300 }
    fn default_session_max_age() -> i64 { 24 }
    fn default_storage_key() -> String { "walletconnect_session".to_string() }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_max_age(&self) -> ChronoDuration {
        session_age(self.session_max_age_hours)
    }
}

impl Default for WalletConnectConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            relay_protocol: Self::default_relay_protocol(),
            connect_timeout_secs: Self::default_connect_timeout(),
            request_timeout_secs: Self::default_request_timeout(),
            session_max_age_hours: Self::default_session_max_age(),
            storage_key: Self::default_storage_key(),
        }
    }
}

/// Deep-link wallet settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TronLinkConfig {
    #[serde(default = "TronLinkConfig::default_url_scheme")]
    pub url_scheme: String,
    #[serde(default = "TronLinkConfig::default_app_store_url")]
    pub app_store_url: String,
    #[serde(default = "TronLinkConfig::default_protocol")]
    pub protocol: String,
    #[serde(default = "TronLinkConfig::default_version")]
    pub version: String,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default = "TronLinkConfig::default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "TronLinkConfig::default_transaction_timeout")]
    pub transaction_timeout_secs: u64,
    #[serde(default = "TronLinkConfig::default_session_max_age")]
    pub session_max_age_hours: i64,
    #[serde(default = "TronLinkConfig::default_storage_key")]
    pub storage_key: String,
}

impl TronLinkConfig {
    fn default_url_scheme() -> String { "tronlinkoutside://".to_string() }
    fn default_app_store_url() -> String {
        "https://apps.apple.com/app/tronlink/id1453530188".to_string()
    }
    fn default_protocol() -> String { "TronLink".to_string() }
    fn default_version() -> String { "1.0".to_string() }
    fn default_connect_timeout() -> u64 { 120 }
    fn default_transaction_timeout() -> u64 { 300 }
    fn default_session_max_age() -> i64 { 12 }
    fn default_storage_key() -> String { "tronlink_session".to_string() }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_secs)
    }

    pub fn session_max_age(&self) -> ChronoDuration {
        session_age(self.session_max_age_hours)
    }
}

impl Default for TronLinkConfig {
    fn default() -> Self {
        Self {
            url_scheme: Self::default_url_scheme(),
            app_store_url: Self::default_app_store_url(),
            protocol: Self::default_protocol(),
            version: Self::default_version(),
            memo: None,
            connect_timeout_secs: Self::default_connect_timeout(),
            transaction_timeout_secs: Self::default_transaction_timeout(),
            session_max_age_hours: Self::default_session_max_age(),
            storage_key: Self::default_storage_key(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletLinkConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub walletconnect: WalletConnectConfig,
    #[serde(default)]
    pub tronlink: TronLinkConfig,
}

impl WalletLinkConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse wallet link config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(project_id) = std::env::var(ENV_PROJECT_ID) {
            self.walletconnect.project_id = project_id;
        }
        if let Ok(scheme) = std::env::var(ENV_CALLBACK_SCHEME) {
            self.app.callback_scheme = scheme;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.app.callback_scheme.trim().is_empty() || self.app.callback_scheme.contains("://") {
            anyhow::bail!("app.callback_scheme must be a bare scheme such as \"epusdtpay\"");
        }
        if self.tronlink.url_scheme.trim().is_empty() {
            anyhow::bail!("tronlink.url_scheme cannot be empty");
        }
        if self.walletconnect.storage_key.is_empty() || self.tronlink.storage_key.is_empty() {
            anyhow::bail!("storage keys cannot be empty");
        }
        if self.walletconnect.storage_key == self.tronlink.storage_key {
            anyhow::bail!("each provider needs its own storage key");
        }
        let timeouts = [
            self.walletconnect.connect_timeout_secs,
            self.walletconnect.request_timeout_secs,
            self.tronlink.connect_timeout_secs,
            self.tronlink.transaction_timeout_secs,
        ];
        if timeouts.contains(&0) {
            anyhow::bail!("timeouts must be greater than zero");
        }
        let ages = [self.walletconnect.session_max_age_hours, self.tronlink.session_max_age_hours];
        if ages.iter().any(|hours| !(1..=MAX_SESSION_AGE_HOURS).contains(hours)) {
            anyhow::bail!("session max age must be between 1 and {MAX_SESSION_AGE_HOURS} hours");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = WalletLinkConfig::default();
        assert_eq!(config.app.callback_scheme, "epusdtpay");
        assert_eq!(config.walletconnect.connect_timeout(), Duration::from_secs(120));
        assert_eq!(config.walletconnect.session_max_age(), ChronoDuration::hours(24));
        assert_eq!(config.tronlink.transaction_timeout(), Duration::from_secs(300));
        assert_eq!(config.tronlink.session_max_age(), ChronoDuration::hours(12));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = WalletLinkConfig::from_toml_str(
            r#"
            [app]
            dapp_name = "Shop"

            [tronlink]
            transaction_timeout_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.app.dapp_name, "Shop");
        assert_eq!(config.app.callback_scheme, "epusdtpay");
        assert_eq!(config.tronlink.transaction_timeout_secs, 60);
        assert_eq!(config.tronlink.protocol, "TronLink");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(WalletLinkConfig::from_toml_str("[walletconnect]\nconnect_timeout_secs = 0").is_err());
        assert!(WalletLinkConfig::from_toml_str("[app]\ncallback_scheme = \"x://\"").is_err());
        assert!(WalletLinkConfig::from_toml_str(
            "[walletconnect]\nstorage_key = \"k\"\n[tronlink]\nstorage_key = \"k\""
        )
        .is_err());
    }

    #[test]
    fn test_session_max_age_bounds() {
        assert!(WalletLinkConfig::from_toml_str("[walletconnect]\nsession_max_age_hours = 0").is_err());
        assert!(
            WalletLinkConfig::from_toml_str("[walletconnect]\nsession_max_age_hours = 9223372036854775807").is_err()
        );
        assert!(WalletLinkConfig::from_toml_str("[tronlink]\nsession_max_age_hours = 8761").is_err());
        let config = WalletLinkConfig::from_toml_str("[tronlink]\nsession_max_age_hours = 8760").unwrap();
        assert_eq!(config.tronlink.session_max_age(), ChronoDuration::hours(MAX_SESSION_AGE_HOURS));

        // unvalidated values are clamped rather than overflowing
        let mut wc = WalletConnectConfig::default();
        wc.session_max_age_hours = i64::MAX;
        assert_eq!(wc.session_max_age(), ChronoDuration::hours(MAX_SESSION_AGE_HOURS));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[walletconnect]\nproject_id = \"abc123\"").unwrap();
        let config = WalletLinkConfig::load(file.path()).unwrap();
        // env may override project id in CI, only the scheme default is stable
        assert_eq!(config.tronlink.url_scheme, "tronlinkoutside://");
        assert!(!config.walletconnect.project_id.is_empty());
    }

    #[test]
    fn test_callback_url() {
        let app = AppConfig::default();
        assert_eq!(app.callback_url("tronlink", "connect"), "epusdtpay://tronlink/connect");
    }
}
