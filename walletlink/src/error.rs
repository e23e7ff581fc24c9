//! Error types for wallet deep-link sessions
//!
//! Two layers:
//! - [`WalletLinkError`] is returned from fallible library calls.
//! - [`ErrorDescriptor`] is what gets recorded in a provider's `last_error`
//!   and rendered by the host UI.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = WalletLinkError> = std::result::Result<T, E>;

/// Error codes the wallet apps use when the user rejects a request
const USER_REJECTED_CODES: &[&str] = &["userRejectedRequest", "4001"];

#[derive(Debug, Error)]
pub enum WalletLinkError {
    #[error("Decryption failed - payload could not be authenticated")]
    DecryptionFailed,

    #[error("Invalid encryption public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid base58 encoding for {field}")]
    InvalidEncoding { field: &'static str },

    #[error("Session not established - connect before requesting a signature")]
    SessionNotEstablished,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Failed to open wallet link: {0}")]
    DispatchFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transaction serialization failed: {0}")]
    Transaction(String),
}

impl WalletLinkError {
    /// The user-facing classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletLinkError::DecryptionFailed
            | WalletLinkError::InvalidEncoding { .. }
            | WalletLinkError::InvalidPublicKey(_) => ErrorKind::DecryptionFailed,
            WalletLinkError::SessionNotEstablished => ErrorKind::SessionNotEstablished,
            WalletLinkError::DispatchFailed(_) => ErrorKind::DispatchFailed,
            WalletLinkError::Protocol(_)
            | WalletLinkError::InvalidUrl(_)
            | WalletLinkError::Json(_)
            | WalletLinkError::Transaction(_) => ErrorKind::ProtocolError,
        }
    }

    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            kind: self.kind(),
            code: None,
            message: self.to_string(),
        }
    }
}

/// Classification of failures surfaced through `last_error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The user rejected the request in the wallet app
    UserCancelled,
    /// Any other explicit error code returned by the wallet app
    ProviderError,
    /// Authentication of an inbound envelope failed
    DecryptionFailed,
    /// A callback missing required fields. Never recorded in `last_error`.
    MalformedCallback,
    /// `request_signature` without a prior successful connect
    SessionNotEstablished,
    /// Handing the URL off to the wallet app failed
    DispatchFailed,
    /// Authenticated payload with the wrong shape or a mismatched wallet key
    ProtocolError,
    /// No callback arrived within the caller-supplied deadline
    TimedOut,
}

impl ErrorKind {
    /// User cancellation is expected and should not be rendered as a fault
    pub fn is_fault(&self) -> bool {
        !matches!(self, ErrorKind::UserCancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    /// Raw error code from the wallet app, if the error came from a callback
    pub code: Option<String>,
    pub message: String,
}

impl ErrorDescriptor {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    /// Classify an explicit error callback from the wallet app
    pub fn from_callback(code: &str, message: Option<&str>) -> Self {
        let kind = if USER_REJECTED_CODES.contains(&code) {
            ErrorKind::UserCancelled
        } else {
            ErrorKind::ProviderError
        };
        let message = match message {
            Some(m) if !m.is_empty() => m.to_string(),
            _ if kind == ErrorKind::UserCancelled => "User rejected the request".to_string(),
            _ => format!("Wallet returned error {}", code),
        };
        Self {
            kind,
            code: Some(code.to_string()),
            message,
        }
    }

    pub fn timed_out() -> Self {
        Self::new(ErrorKind::TimedOut, "No response from wallet app before the deadline")
    }
}

impl std::fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{:?} ({}): {}", self.kind, code, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}
