//! 钱包连接error类型
//!
//! Every failure a connection provider or the manager can report. The type is `Clone` so a
//! failure can travel inside `TransactionResult::Failed` and across broadcast channels.

use thiserror::Error;

/// Wallet provider errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletProviderError {
    /// 钱包未连接
    #[error("Wallet is not connected, connect a wallet first")]
    NotConnected,

    /// 连接失败
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// 交易失败
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// 用户拒绝操作
    #[error("The user rejected the request")]
    UserRejected,

    /// 不支持的网络
    #[error("Unsupported blockchain network")]
    UnsupportedNetwork,

    /// 钱包 App 未安装
    #[error("{0} is not installed, install the wallet app first")]
    WalletAppNotInstalled(String),

    /// 会话过期
    #[error("Session expired, reconnect the wallet")]
    SessionExpired,

    /// 无效地址
    #[error("Invalid wallet address")]
    InvalidAddress,

    /// 数据编码错误
    #[error("Failed to encode transaction data")]
    EncodingError,

    /// 操作超时
    #[error("Operation timed out, please retry")]
    Timeout,
}

impl WalletProviderError {
    /// The user can recover by retrying, installing or reconnecting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SessionExpired | Self::WalletAppNotInstalled(_) | Self::UserRejected | Self::Timeout
        )
    }

    /// Should never be produced from valid UI input.
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::EncodingError | Self::UnsupportedNetwork)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            WalletProviderError::ConnectionFailed("relay down".into()).to_string(),
            "Connection failed: relay down"
        );
        assert_eq!(
            WalletProviderError::WalletAppNotInstalled("TronLink".into()).to_string(),
            "TronLink is not installed, install the wallet app first"
        );
    }

    #[test]
    fn test_recoverable_and_defect_are_disjoint() {
        let all = vec![
            WalletProviderError::NotConnected,
            WalletProviderError::ConnectionFailed(String::new()),
            WalletProviderError::TransactionFailed(String::new()),
            WalletProviderError::UserRejected,
            WalletProviderError::UnsupportedNetwork,
            WalletProviderError::WalletAppNotInstalled(String::new()),
            WalletProviderError::SessionExpired,
            WalletProviderError::InvalidAddress,
            WalletProviderError::EncodingError,
            WalletProviderError::Timeout,
        ];
        for err in &all {
            assert!(!(err.is_recoverable() && err.is_defect()), "{err:?}");
        }
        assert!(WalletProviderError::Timeout.is_recoverable());
        assert!(WalletProviderError::EncodingError.is_defect());
        assert!(!WalletProviderError::NotConnected.is_recoverable());
    }
}
