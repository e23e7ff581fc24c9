//! WalletLink - encrypted deep-link sessions with external Solana wallets
//!
//! Implements the universal-link connect / signAndSendTransaction protocol
//! spoken by Phantom and Solflare:
//!
//! - [`crypto`]: ephemeral X25519 keys and the crypto_box envelope
//! - [`deeplink`]: outbound request URLs and inbound callback parsing
//! - [`state`]: the per-provider session state machine
//! - [`store`]: process-wide session holder with change subscriptions
//!
//! One generic state machine serves every wallet; the differences between
//! wallets are data in [`provider::ProviderConfig`].

pub mod crypto;
pub mod deeplink;
pub mod error;
pub mod provider;
pub mod state;
pub mod store;
pub mod transaction;

#[cfg(test)]
mod test_support;


#[cfg(test)]
mod fuzz_tests;

pub use error::{ErrorDescriptor, ErrorKind, Result, WalletLinkError};
pub use provider::{AppIdentity, Cluster, ProviderConfig, TransactionEncoding, WalletProvider};
pub use state::{CallbackOutcome, ConnectionStatus, ProviderSessionState, WalletSession};
pub use store::{SessionStore, Subscription, UrlDispatcher};
pub use transaction::serialize_unsigned_transaction;
