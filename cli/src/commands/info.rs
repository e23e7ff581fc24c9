//! Show configuration and provider info

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use walletlink::WalletProvider;

use crate::config::{load_or_default, walletlink_dir};

pub fn run(path: &Path) -> Result<()> {
    let config = load_or_default(path)?;

    println!();
    println!("{}", "WalletLink Configuration".yellow().bold());
    println!();

    println!("{}:", "Config File".cyan());
    if path.exists() {
        println!("  {}", path.display());
    } else {
        println!("  {} {}", path.display(), "(not created, using defaults)".dimmed());
    }
    if let Ok(dir) = walletlink_dir() {
        println!("  Directory: {}", dir.display());
    }
    println!();

    println!("{}:", "App Identity".cyan());
    println!("  URL:     {}", config.app.app_url);
    println!("  Scheme:  {}://", config.app.app_scheme);
    println!("  Cluster: {}", config.app.cluster.as_str());
    match config.request_timeout_secs {
        Some(secs) => println!("  Timeout: {}s", secs),
        None => println!("  Timeout: {}", "none".dimmed()),
    }
    println!();

    for provider in WalletProvider::ALL {
        let provider_config = config.provider_config(provider);
        let source = if config.providers.contains_key(&provider) {
            "override".yellow()
        } else {
            "built-in".dimmed()
        };
        println!("{} ({}):", provider.to_string().cyan(), source);
        println!("  Base URL:     {}", provider_config.base_url);
        println!("  Wallet key:   {}", provider_config.remote_key_param);
        println!("  Payload keys: {}", provider_config.payload_params.join(", "));
        println!(
            "  Callbacks:    {}://{}/...",
            config.app.app_scheme, provider_config.callback_host
        );
        println!();
    }

    Ok(())
}
