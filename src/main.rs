// src/main.rs
//! wallet-link entry point.
use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use usdt_wallet_link::cli::{self, Cli};

fn main() -> Result<()> {
    let args = Cli::parse();

    init_logging()?;
    info!("wallet-link v{}", env!("CARGO_PKG_VERSION"));

    let config = args.load_config()?;
    let output = cli::run(&args.command, &config)?;
    print!("{output}");
    Ok(())
}

fn init_logging() -> Result<()> {
    // logs go to stderr so command output stays pipeable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
