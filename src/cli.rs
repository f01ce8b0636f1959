//! Command-line surface: inspect the registries and build the payloads the providers send,
//! without a wallet on the other end.

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::core::config::WalletLinkConfig;
use crate::core::domain::{to_smallest_unit, ApproveAmount, ApproveRequest, TransactionRequest};
use crate::core::validation::validate_address;
use crate::network::wallets;
use crate::network::{lookup, Network};
use crate::provider::evm::{wallet_link_for_uri, PairingUri, SessionProposal};
use crate::provider::tron::TronLinkIntent;

#[derive(Debug, Parser)]
#[command(name = "wallet-link", about = "USDT wallet connection toolkit", version, disable_help_subcommand = true)]
pub struct Cli {
    /// TOML config file; defaults plus environment overrides when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List supported networks
    Networks,
    /// List wallet apps, optionally only those usable on a network
    Wallets {
        #[arg(long)]
        network: Option<Network>,
    },
    /// Check an address against a network's format
    Validate {
        #[arg(long)]
        network: Network,
        #[arg(long)]
        address: String,
    },
    /// Call data for a USDT `transfer`
    EncodeTransfer {
        #[arg(long, default_value = "ethereum")]
        network: Network,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: Decimal,
    },
    /// Call data for a USDT `approve`
    EncodeApprove {
        #[arg(long, default_value = "ethereum")]
        network: Network,
        #[arg(long)]
        spender: String,
        #[arg(long, required_unless_present = "unlimited")]
        amount: Option<Decimal>,
        #[arg(long, conflicts_with = "amount")]
        unlimited: bool,
    },
    /// Fresh pairing URI and the session proposal sent with it
    PairingUri {
        #[arg(long, default_value = "ethereum")]
        network: Network,
        /// Also print the link that opens this wallet with the URI
        #[arg(long)]
        wallet: Option<String>,
    },
    /// TronLink deep link for an action
    TronLink {
        #[command(subcommand)]
        action: TronLinkAction,
    },
    /// Block explorer URL for a transaction hash
    Explorer {
        #[arg(long)]
        network: Network,
        #[arg(long)]
        hash: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum TronLinkAction {
    Connect,
    Transfer {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: Decimal,
    },
    Approve {
        #[arg(long)]
        spender: String,
        #[arg(long, required_unless_present = "unlimited")]
        amount: Option<Decimal>,
        #[arg(long, conflicts_with = "amount")]
        unlimited: bool,
    },
}

impl Cli {
    pub fn load_config(&self) -> Result<WalletLinkConfig> {
        match &self.config {
            Some(path) => WalletLinkConfig::load(path),
            None => WalletLinkConfig::from_env(),
        }
    }
}

fn approve_amount(amount: Option<Decimal>, unlimited: bool) -> Result<ApproveAmount> {
    match (amount, unlimited) {
        (_, true) => Ok(ApproveAmount::Unlimited),
        (Some(amount), false) => Ok(ApproveAmount::Limited(amount)),
        (None, false) => bail!("either --amount or --unlimited is required"),
    }
}

/// Executes `command` and returns what should be printed.
pub fn run(command: &Commands, config: &WalletLinkConfig) -> Result<String> {
    let mut out = String::new();
    match command {
        Commands::Networks => {
            for network in Network::ALL {
                let info = network.info();
                let chain = info.chain_id.map_or_else(|| "-".to_string(), |id| id.to_string());
                writeln!(
                    out,
                    "{:<10} chain={:<4} caip2={:<10} usdt={} decimals={}",
                    info.display_name, chain, info.caip2, info.usdt_contract, info.usdt_decimals
                )?;
            }
        }
        Commands::Wallets { network } => {
            let list = match network {
                Some(network) => wallets::wallets_for(*network),
                None => wallets::SUPPORTED_WALLETS.iter().collect(),
            };
            for wallet in list {
                let networks: Vec<_> = wallet.supported_networks.iter().map(|n| n.name()).collect();
                writeln!(
                    out,
                    "{:<13} {:<20} {:<13} {}",
                    wallet.name,
                    wallet.deep_link_scheme,
                    wallet.provider_type.name(),
                    networks.join(",")
                )?;
            }
        }
        Commands::Validate { network, address } => {
            validate_address(address, *network)?;
            writeln!(out, "valid {} address", network.name())?;
        }
        Commands::EncodeTransfer { network, to, amount } => {
            validate_address(to, *network)?;
            let request = TransactionRequest::new(to.clone(), *amount, *network);
            writeln!(out, "{}", request.call_data_hex()?)?;
        }
        Commands::EncodeApprove { network, spender, amount, unlimited } => {
            validate_address(spender, *network)?;
            let request = ApproveRequest::new(spender.clone(), approve_amount(*amount, *unlimited)?, *network);
            writeln!(out, "{}", request.call_data_hex()?)?;
        }
        Commands::PairingUri { network, wallet } => {
            if !network.is_evm() {
                bail!("{} does not use pairing, try `tron-link connect`", network.name());
            }
            let uri = PairingUri::generate(&config.walletconnect.relay_protocol);
            let proposal = SessionProposal::new(&uri, *network, &config.app);
            writeln!(out, "{uri}")?;
            writeln!(out, "{}", serde_json::to_string_pretty(&proposal)?)?;
            if let Some(name) = wallet {
                let app = wallets::find_by_name(name).ok_or_else(|| anyhow!("unknown wallet: {name}"))?;
                writeln!(out, "{}", wallet_link_for_uri(app, &uri.to_string()))?;
            }
        }
        Commands::TronLink { action } => {
            let tron = &config.tronlink;
            let decimals = lookup(Network::Tron).usdt_decimals;
            let intent = match action {
                TronLinkAction::Connect => TronLinkIntent::connect(tron, &config.app),
                TronLinkAction::Transfer { to, amount } => {
                    validate_address(to, Network::Tron)?;
                    TronLinkIntent::transfer(tron, &config.app, to, to_smallest_unit(*amount, decimals)?)
                }
                TronLinkAction::Approve { spender, amount, unlimited } => {
                    validate_address(spender, Network::Tron)?;
                    let amount = match approve_amount(*amount, *unlimited)? {
                        ApproveAmount::Unlimited => None,
                        ApproveAmount::Limited(amount) => Some(to_smallest_unit(amount, decimals)?),
                    };
                    TronLinkIntent::approve(tron, &config.app, spender, amount)
                }
            };
            writeln!(out, "{}", intent.to_deep_link(&tron.url_scheme)?)?;
        }
        Commands::Explorer { network, hash } => {
            if hash.is_empty() {
                bail!("empty transaction hash");
            }
            writeln!(out, "{}", lookup(*network).explorer_url(hash))?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn exec(args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("wallet-link").chain(args.iter().copied()))?;
        run(&cli.command, &WalletLinkConfig::default())
    }

    #[test]
    fn test_networks_lists_all() {
        let out = exec(&["networks"]).unwrap();
        assert_eq!(out.lines().count(), 4);
        assert!(out.contains("TR7NHqjeKQxGTCi8q282RJWC3SVrFoJypL"));
    }

    #[test]
    fn test_wallets_for_tron() {
        let out = exec(&["wallets", "--network", "tron"]).unwrap();
        let names: Vec<_> = out.lines().map(|l| l.split_whitespace().next().unwrap()).collect();
        assert_eq!(names, vec!["TokenPocket", "TronLink"]);
    }

    #[test]
    fn test_encode_transfer() {
        let out = exec(&[
            "encode-transfer",
            "--to",
            "0x2222222222222222222222222222222222222222",
            "--amount",
            "12.5",
        ])
        .unwrap();
        assert!(out.trim().starts_with("0xa9059cbb"));
        assert!(out.trim().ends_with("bebc20"));
    }

    #[test]
    fn test_encode_approve_requires_amount_or_unlimited() {
        assert!(exec(&["encode-approve", "--spender", "0x2222222222222222222222222222222222222222"]).is_err());
        let out = exec(&[
            "encode-approve",
            "--spender",
            "0x2222222222222222222222222222222222222222",
            "--unlimited",
        ])
        .unwrap();
        assert!(out.trim().ends_with(&"f".repeat(64)));
    }

    #[test]
    fn test_pairing_uri_rejects_tron() {
        assert!(exec(&["pairing-uri", "--network", "tron"]).is_err());
        let out = exec(&["pairing-uri", "--network", "bsc", "--wallet", "TokenPocket"]).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert!(lines[0].starts_with("wc:"));
        assert!(out.contains("eip155:56"));
        assert!(lines.last().unwrap().starts_with("tpoutside://wc?uri=wc%3A"));
    }

    #[test]
    fn test_tron_link_transfer() {
        let out = exec(&[
            "tron-link",
            "transfer",
            "--to",
            "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7",
            "--amount",
            "1.5",
        ])
        .unwrap();
        assert!(out.starts_with("tronlinkoutside://pull.activity?param="));
        assert!(out.contains("1500000"));
    }

    #[test]
    fn test_validate_and_explorer() {
        assert!(exec(&["validate", "--network", "tron", "--address", "Tabc"]).is_err());
        let out = exec(&["explorer", "--network", "polygon", "--hash", "0xabc"]).unwrap();
        assert_eq!(out.trim(), "https://polygonscan.com/tx/0xabc");
    }
}
