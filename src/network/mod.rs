//! 网络与钱包注册表

pub mod registry;
pub mod wallets;

pub use registry::{lookup, Network, NetworkInfo, ProtocolFamily};
pub use wallets::{WalletAppInfo, SUPPORTED_WALLETS};
