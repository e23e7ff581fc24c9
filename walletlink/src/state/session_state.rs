//! Observable per-provider session record

use serde::{Deserialize, Serialize};

use crate::error::ErrorDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    AwaitingSignature,
    Error,
}

impl ConnectionStatus {
    /// A request has been handed to the wallet and its callback is outstanding
    pub fn is_pending(&self) -> bool {
        matches!(self, ConnectionStatus::Connecting | ConnectionStatus::AwaitingSignature)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::AwaitingSignature => "awaiting signature",
            ConnectionStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Snapshot of one wallet provider's session
///
/// `remote_public_key` and `session_token` are always set and cleared
/// together.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderSessionState {
    pub connection_status: ConnectionStatus,
    /// Wallet's long-lived X25519 encryption key, learned on connect
    pub remote_public_key: Option<[u8; 32]>,
    /// Chain account address (base58), distinct from the encryption key
    pub wallet_address: Option<String>,
    /// Opaque token echoed back on every later request
    pub session_token: Option<String>,
    /// Most recent transaction signature (base58)
    pub last_signature: Option<String>,
    pub last_error: Option<ErrorDescriptor>,
    /// Diagnostic only
    pub last_raw_callback_url: Option<String>,
}

impl ProviderSessionState {
    /// Initial values, preserving only the diagnostic callback URL
    pub fn reset(&mut self) {
        let last_url = self.last_raw_callback_url.take();
        *self = Self {
            last_raw_callback_url: last_url,
            ..Self::default()
        };
    }

    pub fn is_session_established(&self) -> bool {
        self.remote_public_key.is_some() && self.session_token.is_some()
    }

    pub fn remote_public_key_b58(&self) -> Option<String> {
        self.remote_public_key
            .map(|key| bs58::encode(key).into_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_reset_preserves_only_last_url() {
        let mut state = ProviderSessionState {
            connection_status: ConnectionStatus::Connected,
            remote_public_key: Some([9u8; 32]),
            wallet_address: Some("Addr".into()),
            session_token: Some("Tok".into()),
            last_signature: Some("Sig".into()),
            last_error: Some(ErrorDescriptor::new(ErrorKind::ProviderError, "x")),
            last_raw_callback_url: Some("walletlink://phantom/onConnect".into()),
        };
        state.reset();

        assert_eq!(
            state,
            ProviderSessionState {
                last_raw_callback_url: Some("walletlink://phantom/onConnect".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_pending_statuses() {
        assert!(ConnectionStatus::Connecting.is_pending());
        assert!(ConnectionStatus::AwaitingSignature.is_pending());
        assert!(!ConnectionStatus::Connected.is_pending());
        assert!(!ConnectionStatus::Error.is_pending());
    }
}
