//! Interactive wallet session
//!
//! Reads commands from stdin. Wallet links are printed (or launched), and the
//! callback URL the wallet redirects to is pasted back in as a line of its
//! own. Outstanding requests are abandoned after the configured timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use colored::Colorize;
use solana_sdk::{
    hash::Hash, message::Message, pubkey::Pubkey, system_instruction, transaction::Transaction,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};
use walletlink::{
    serialize_unsigned_transaction, CallbackOutcome, ConnectionStatus, ProviderSessionState,
    SessionStore, WalletProvider,
};

use crate::config::AppConfig;
use crate::dispatch::TerminalDispatcher;

/// One line of interactive input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Connect(WalletProvider),
    Sign {
        provider: WalletProvider,
        recipient: Pubkey,
        lamports: u64,
        blockhash: Hash,
    },
    /// Already-serialized unsigned transaction, base64
    SignRaw {
        provider: WalletProvider,
        transaction: Vec<u8>,
    },
    Disconnect {
        provider: WalletProvider,
        remote: bool,
    },
    Status,
    Callback(String),
    Help,
    Quit,
}

pub struct SessionOptions {
    /// Launch links with the desktop opener instead of only printing them
    pub launch: bool,
    /// Program to launch links with, overriding the desktop default
    pub opener: Option<String>,
    pub timeout: Option<Duration>,
}

fn parse_provider(token: Option<&str>) -> Result<WalletProvider> {
    token
        .context("Missing wallet provider (phantom or solflare)")?
        .parse()
        .map_err(|e: String| anyhow!(e))
}

/// Parse one input line; `None` for blank lines
pub fn parse_line(line: &str) -> Result<Option<SessionCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line.contains("://") && !line.contains(char::is_whitespace) {
        return Ok(Some(SessionCommand::Callback(line.to_string())));
    }

    let mut tokens = line.split_whitespace();
    let command = match tokens.next().unwrap_or_default().to_ascii_lowercase().as_str() {
        "connect" | "c" => SessionCommand::Connect(parse_provider(tokens.next())?),
        "sign" => {
            let provider = parse_provider(tokens.next())?;
            let recipient = tokens
                .next()
                .context("Usage: sign <provider> <recipient> <lamports> [blockhash]")?;
            let recipient: Pubkey = recipient
                .parse()
                .map_err(|_| anyhow!("Invalid recipient address '{}'", recipient))?;
            let lamports: u64 = tokens
                .next()
                .context("Missing lamports")?
                .parse()
                .context("Lamports must be a whole number")?;
            let blockhash = match tokens.next() {
                Some(hash) => hash
                    .parse()
                    .map_err(|_| anyhow!("Invalid blockhash '{}'", hash))?,
                None => Hash::default(),
            };
            SessionCommand::Sign {
                provider,
                recipient,
                lamports,
                blockhash,
            }
        }
        "sign-raw" => {
            let provider = parse_provider(tokens.next())?;
            let encoded = tokens
                .next()
                .context("Usage: sign-raw <provider> <base64-transaction>")?;
            let transaction = STANDARD
                .decode(encoded)
                .context("Transaction must be standard base64")?;
            if transaction.is_empty() {
                bail!("Transaction is empty");
            }
            SessionCommand::SignRaw {
                provider,
                transaction,
            }
        }
        "disconnect" | "d" => {
            let provider = parse_provider(tokens.next())?;
            let remote = match tokens.next() {
                None => false,
                Some("--remote") => true,
                Some(other) => bail!("Unexpected argument '{}'", other),
            };
            SessionCommand::Disconnect { provider, remote }
        }
        "status" | "s" => SessionCommand::Status,
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" | "q" => SessionCommand::Quit,
        other => bail!("Unknown command '{}'. Type 'help' for a list.", other),
    };

    if let Some(extra) = tokens.next() {
        bail!("Unexpected argument '{}'", extra);
    }
    Ok(Some(command))
}

/// Unsigned SOL transfer from the connected wallet, in wire format
pub fn build_transfer(
    payer: &str,
    recipient: &Pubkey,
    lamports: u64,
    blockhash: Hash,
) -> Result<Vec<u8>> {
    let payer: Pubkey = payer
        .parse()
        .map_err(|_| anyhow!("Connected wallet address '{}' is not a Solana public key", payer))?;
    let mut message = Message::new(
        &[system_instruction::transfer(&payer, recipient, lamports)],
        Some(&payer),
    );
    message.recent_blockhash = blockhash;
    let transaction = Transaction::new_unsigned(message);
    Ok(serialize_unsigned_transaction(&transaction)?)
}

/// Run a command. Returns the provider whose request is now outstanding.
fn execute(store: &SessionStore, command: SessionCommand) -> Result<Option<WalletProvider>> {
    match command {
        SessionCommand::Connect(provider) => {
            store.connect(provider)?;
            Ok(Some(provider))
        }
        SessionCommand::Sign {
            provider,
            recipient,
            lamports,
            blockhash,
        } => {
            let state = store.get_state(provider);
            let Some(payer) = state.wallet_address.as_deref() else {
                bail!("{} is not connected. Run 'connect {}' first.", provider, provider.name());
            };
            let transaction = build_transfer(payer, &recipient, lamports, blockhash)?;
            debug!(%provider, bytes = transaction.len(), "transfer built");
            store.request_signature(provider, &transaction)?;
            Ok(Some(provider))
        }
        SessionCommand::SignRaw {
            provider,
            transaction,
        } => {
            store.request_signature(provider, &transaction)?;
            Ok(Some(provider))
        }
        SessionCommand::Disconnect { provider, remote } => {
            if remote {
                if store.disconnect_remote(provider)?.is_none() {
                    println!("{}", "No wallet session to end; disconnected locally.".dimmed());
                }
            } else {
                store.disconnect(provider);
            }
            Ok(None)
        }
        SessionCommand::Status => {
            for provider in WalletProvider::ALL {
                print_state(provider, &store.get_state(provider));
            }
            Ok(None)
        }
        SessionCommand::Callback(url) => {
            match store.handle_callback(&url) {
                None => println!("{}", "Not a wallet callback for this app.".yellow()),
                Some((provider, CallbackOutcome::Ignored)) => println!(
                    "{} {}",
                    format!("[{}]", provider).bold(),
                    "callback ignored (no outstanding request or incomplete link)".yellow()
                ),
                Some((_, CallbackOutcome::Applied)) => {}
            }
            Ok(None)
        }
        SessionCommand::Help => {
            print_help();
            Ok(None)
        }
        SessionCommand::Quit => Ok(None),
    }
}

fn print_state(provider: WalletProvider, state: &ProviderSessionState) {
    let status = state.connection_status.to_string();
    let status = match state.connection_status {
        ConnectionStatus::Connected => status.green(),
        ConnectionStatus::Connecting | ConnectionStatus::AwaitingSignature => status.yellow(),
        ConnectionStatus::Error => status.red(),
        ConnectionStatus::Disconnected => status.dimmed(),
    };
    println!(
        "{} {} {}",
        chrono::Local::now().format("%H:%M:%S").to_string().dimmed(),
        format!("[{}]", provider).bold(),
        status
    );
    if let Some(address) = &state.wallet_address {
        println!("  Wallet:    {}", address);
    }
    if let Some(signature) = &state.last_signature {
        println!("  Signature: {}", signature);
    }
    if let Some(error) = &state.last_error {
        println!("  Error:     {}", error.to_string().red());
    }
}

fn print_help() {
    println!();
    println!("{}", "Commands:".cyan());
    println!("  connect <phantom|solflare>                            Start a connection");
    println!("  sign <provider> <recipient> <lamports> [blockhash]    Request a signed transfer");
    println!("  sign-raw <provider> <base64-tx>                       Request a signature for any transaction");
    println!("  disconnect <provider> [--remote]                      End the session");
    println!("  status                                                Show both sessions");
    println!("  quit                                                  Leave");
    println!();
    println!("Paste the callback URL the wallet redirects to as its own line.");
    println!();
}

async fn wait_for(deadline: Option<(WalletProvider, Instant)>) {
    match deadline {
        Some((_, at)) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

pub async fn run(config: AppConfig, options: SessionOptions) -> Result<()> {
    let dispatcher = Arc::new(match options.opener {
        Some(program) => TerminalDispatcher::with_opener(program),
        None => TerminalDispatcher::new(options.launch),
    });
    let store = SessionStore::new(config.app.clone(), config.providers.clone(), dispatcher);

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let subscriptions: Vec<_> = WalletProvider::ALL
        .into_iter()
        .map(|provider| {
            let tx = events_tx.clone();
            store.subscribe(provider, move |provider, state| {
                let _ = tx.send((provider, state.clone()));
            })
        })
        .collect();

    println!("{}", "WalletLink session".yellow().bold());
    println!(
        "  App: {}  Scheme: {}://  Cluster: {}",
        config.app.app_url,
        config.app.app_scheme,
        config.app.cluster.as_str()
    );
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut deadlines: HashMap<WalletProvider, Instant> = HashMap::new();

    loop {
        let next_deadline = deadlines
            .iter()
            .min_by_key(|(_, at)| **at)
            .map(|(provider, at)| (*provider, *at));

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match parse_line(&line) {
                    Ok(Some(SessionCommand::Quit)) => break,
                    Ok(Some(command)) => match execute(&store, command) {
                        Ok(Some(provider)) => {
                            if let Some(timeout) = options.timeout {
                                deadlines.insert(provider, Instant::now() + timeout);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => println!("{} {}", "error:".red().bold(), e),
                    },
                    Ok(None) => {}
                    Err(e) => println!("{} {}", "error:".red().bold(), e),
                }
            }
            Some((provider, state)) = events.recv() => {
                if !state.connection_status.is_pending() {
                    deadlines.remove(&provider);
                }
                print_state(provider, &state);
            }
            _ = wait_for(next_deadline) => {
                if let Some((provider, _)) = next_deadline {
                    deadlines.remove(&provider);
                    if store.time_out(provider) {
                        info!(%provider, "wallet did not answer in time");
                    }
                }
            }
        }
    }

    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    // Flush anything queued by the last command
    while let Ok((provider, state)) = events.try_recv() {
        print_state(provider, &state);
    }
    Ok(())
}
