// src/lib.rs

pub mod cli;
pub mod core;
pub mod network;
pub mod provider;
pub mod storage;

pub use crate::core::{
    ApproveAmount, ConnectionState, TransactionResult, WalletLinkConfig, WalletManager, WalletProviderError,
    WalletSession, WalletStatus,
};
pub use crate::network::Network;
pub use crate::provider::{ProviderKind, WalletConnectionProvider};
