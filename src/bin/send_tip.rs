//! Operator smoke tool: drive the full tip flow against the configured RPC
//! endpoint (a dev node signing with its own unlocked account) and print the
//! outcome.
//!
//! Usage: gratuity-tip <recipient-address>

use anyhow::{Context, Result};
use gratuity_api::address::sanitize_wallet_address;
use gratuity_api::config::ApiConfig;
use gratuity_api::wallet::{RpcProvider, TipAttempt, WalletConnector, send_tip};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .compact()
        .init();

    let recipient = std::env::args()
        .nth(1)
        .context("Usage: gratuity-tip <recipient-address>")?;
    let recipient = sanitize_wallet_address(&recipient)?;

    let config = ApiConfig::load().context("Failed to load configuration")?;
    let provider = RpcProvider::new(&config.chain.rpc_url, config.chain.request_timeout())
        .context("Failed to build RPC provider")?;
    let mut connector = WalletConnector::new(provider, config.chain.clone());

    info!(
        "Sending one {} {} tip to {recipient} on {}",
        config.chain.tip_amount, config.chain.token_symbol, config.chain.network
    );

    match send_tip(&mut connector, &recipient).await {
        TipAttempt::Sent { tx_hash } => {
            println!("Tip sent: {}", config.chain.explorer_tx_url(&tx_hash));
            Ok(())
        }
        TipAttempt::Failed { kind, message } => {
            eprintln!("Tip failed ({kind:?}): {message}");
            std::process::exit(1);
        }
    }
}
