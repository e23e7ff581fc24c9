//! WalletLink CLI - drive Phantom / Solflare deep-link sessions from a terminal

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use walletlink::{Cluster, WalletProvider};

mod commands;
mod config;
mod dispatch;



use commands::*;

#[derive(Parser)]
#[command(name = "walletlink")]
#[command(version = "0.1.0")]
#[command(about = "Encrypted deep-link sessions with Phantom and Solflare")]
#[command(long_about = r#"
WalletLink connects to mobile wallet apps over universal links.

Every request carries a fresh X25519 key; the wallet answers by redirecting
to this app's URL scheme with an encrypted payload.

Quick Start:
  1. walletlink config init      Pick the app URL and callback scheme
  2. walletlink session          Connect, sign and disconnect interactively
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: ~/.walletlink/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session: connect, sign, paste callbacks
    Session {
        /// Launch links with the desktop opener
        #[arg(long)]
        open: bool,

        /// Launch links with this program instead (implies --open)
        #[arg(long, value_name = "PROGRAM")]
        opener: Option<String>,

        /// Seconds before an unanswered request is abandoned (0 waits forever)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print request links without starting a session
    Url {
        #[command(subcommand)]
        action: UrlAction,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show configuration and provider info
    Info,
}

#[derive(Subcommand)]
enum UrlAction {
    /// Connect link for a wallet
    Connect {
        /// phantom or solflare
        provider: WalletProvider,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a new config file
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,

        /// URL wallets show for this app
        #[arg(long)]
        app_url: Option<String>,

        /// Custom URL scheme wallets redirect to
        #[arg(long)]
        scheme: Option<String>,

        /// mainnet-beta, testnet or devnet
        #[arg(long)]
        cluster: Option<Cluster>,

        /// Request timeout in seconds (0 disables)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print the config file
    Show,
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "walletlink=debug" } else { "warn" })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = config::resolve_path(cli.config.as_deref())?;

    match cli.command {
        Commands::Session {
            open,
            opener,
            timeout,
        } => {
            let app_config = config::load_or_default(&config_path)?;
            let timeout = match timeout {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => app_config.request_timeout_secs,
            };
            session::run(
                app_config,
                session::SessionOptions {
                    launch: open,
                    opener,
                    timeout: timeout.map(Duration::from_secs),
                },
            )
            .await?;
        }
        Commands::Url { action } => match action {
            UrlAction::Connect { provider } => {
                let app_config = config::load_or_default(&config_path)?;
                link::connect(&app_config, provider)?;
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Init {
                force,
                app_url,
                scheme,
                cluster,
                timeout,
            } => {
                commands::config::init(
                    &config_path,
                    commands::config::InitOptions {
                        force,
                        app_url,
                        scheme,
                        cluster,
                        timeout_secs: timeout,
                    },
                )?;
            }
            ConfigAction::Show => {
                commands::config::show(&config_path)?;
            }
        },
        Commands::Info => {
            info::run(&config_path)?;
        }
    }

    Ok(())
}
