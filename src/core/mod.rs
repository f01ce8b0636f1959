pub mod abi;
pub mod config;
pub mod domain;
pub mod errors;
pub mod validation;
pub mod wallet_manager;

// 重新导出关键结构
pub use config::WalletLinkConfig;
pub use domain::{ApproveAmount, ApproveRequest, ConnectionState, TransactionRequest, TransactionResult, WalletSession};
pub use errors::WalletProviderError;
pub use wallet_manager::{WalletManager, WalletStatus};
