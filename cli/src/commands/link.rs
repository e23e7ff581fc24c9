//! Print a single wallet request link without starting a session
//!
//! The ephemeral key behind the link is discarded on exit, so a callback to
//! it can never be opened. Useful for checking the link shape and redirect
//! wiring of a config.

use anyhow::Result;
use colored::Colorize;
use walletlink::{WalletProvider, WalletSession};

use crate::config::AppConfig;

pub fn connect(config: &AppConfig, provider: WalletProvider) -> Result<()> {
    let mut session = WalletSession::new(
        provider,
        config.provider_config(provider),
        config.app.clone(),
    );
    let url = session.connect()?;

    println!("{}", format!("{} connect link", provider).cyan());
    println!("  {}", url);
    println!();
    println!("Parameters:");
    for (key, value) in url.query_pairs() {
        println!("  {:<28} {}", key, value);
    }
    if let Some(key) = session.dapp_public_key_b58() {
        println!();
        println!("{}", format!("Ephemeral key {} is not kept.", key).dimmed());
    }
    Ok(())
}
