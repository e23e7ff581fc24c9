//! Per-wallet protocol parameters and dapp identity
//!
//! Phantom and Solflare speak the same deep-link protocol with small naming
//! differences. Everything that differs lives in [`ProviderConfig`] so the
//! session logic is written once.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

/// Wallet apps supported out of the box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletProvider {
    Phantom,
    Solflare,
}

impl WalletProvider {
    pub const ALL: [WalletProvider; 2] = [WalletProvider::Phantom, WalletProvider::Solflare];

    pub fn name(&self) -> &'static str {
        match self {
            WalletProvider::Phantom => "phantom",
            WalletProvider::Solflare => "solflare",
        }
    }

    /// Built-in protocol parameters for this wallet
    pub fn default_config(&self) -> ProviderConfig {
        match self {
            WalletProvider::Phantom => ProviderConfig {
                base_url: "https://phantom.app".into(),
                remote_key_param: "phantom_encryption_public_key".into(),
                payload_params: vec!["data".into()],
                callback_host: "phantom".into(),
                transaction_encoding: TransactionEncoding::Base64,
            },
            WalletProvider::Solflare => ProviderConfig {
                base_url: "https://solflare.com".into(),
                remote_key_param: "solflare_encryption_public_key".into(),
                payload_params: vec!["data".into(), "payload".into()],
                callback_host: "solflare".into(),
                transaction_encoding: TransactionEncoding::Base64,
            },
        }
    }
}

impl std::fmt::Display for WalletProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for WalletProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "phantom" => Ok(WalletProvider::Phantom),
            "solflare" => Ok(WalletProvider::Solflare),
            other => Err(format!("Unknown wallet provider '{}' (expected phantom or solflare)", other)),
        }
    }
}

/// How the unsigned transaction is encoded inside the sign request payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionEncoding {
    #[default]
    Base64,
    Base58,
}

impl TransactionEncoding {
    pub fn encode(&self, bytes: &[u8]) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine};
        match self {
            TransactionEncoding::Base64 => STANDARD.encode(bytes),
            TransactionEncoding::Base58 => bs58::encode(bytes).into_string(),
        }
    }
}

/// Protocol parameters for one wallet app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Universal-link origin, e.g. `https://phantom.app`
    pub base_url: String,
    /// Callback query key carrying the wallet's encryption public key
    pub remote_key_param: String,
    /// Callback query keys accepted for the ciphertext, in priority order
    pub payload_params: Vec<String>,
    /// Host segment of this wallet's redirect links
    pub callback_host: String,
    #[serde(default)]
    pub transaction_encoding: TransactionEncoding,
}

/// Solana cluster passed to the wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Cluster {
    #[serde(rename = "mainnet-beta")]
    MainnetBeta,
    #[serde(rename = "testnet")]
    Testnet,
    #[default]
    #[serde(rename = "devnet")]
    Devnet,
}

impl Cluster {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cluster::MainnetBeta => "mainnet-beta",
            Cluster::Testnet => "testnet",
            Cluster::Devnet => "devnet",
        }
    }
}

impl std::str::FromStr for Cluster {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "mainnet-beta" | "mainnet" => Ok(Cluster::MainnetBeta),
            "testnet" => Ok(Cluster::Testnet),
            "devnet" => Ok(Cluster::Devnet),
            other => Err(format!("Unknown cluster '{}'", other)),
        }
    }
}

/// Which request a redirect link answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectAction {
    Connect,
    SignAndSendTransaction,
    Disconnect,
}

impl RedirectAction {
    pub fn path(&self) -> &'static str {
        match self {
            RedirectAction::Connect => "onConnect",
            RedirectAction::SignAndSendTransaction => "onSignAndSendTransaction",
            RedirectAction::Disconnect => "onDisconnect",
        }
    }
}

/// Identity of this dapp as presented to wallet apps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    /// Shown by the wallet and used to fetch app metadata
    pub app_url: String,
    /// Custom URL scheme the OS routes back to this app
    pub app_scheme: String,
    #[serde(default)]
    pub cluster: Cluster,
}

impl AppIdentity {
    /// `{app_scheme}://{callback_host}/{action}`
    pub fn redirect_link(&self, provider: &ProviderConfig, action: RedirectAction) -> Result<Url> {
        let link = format!("{}://{}/{}", self.app_scheme, provider.callback_host, action.path());
        Ok(Url::parse(&link)?)
    }

    /// Whether an inbound callback was addressed to `provider`
    pub fn matches_callback(&self, provider: &ProviderConfig, callback: &Url) -> bool {
        callback.scheme().eq_ignore_ascii_case(&self.app_scheme)
            && callback
                .host_str()
                .map(|h| h.eq_ignore_ascii_case(&provider.callback_host))
                .unwrap_or(false)
    }
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self {
            app_url: "https://walletlink.app".into(),
            app_scheme: "walletlink".into(),
            cluster: Cluster::Devnet,
        }
    }
}
