//! Ephemeral encryption keys for a single wallet connection attempt
//!
//! The dapp side of every round trip is an X25519 keypair generated fresh
//! per `connect()`. The secret half never leaves this process and is
//! zeroized when the keypair is dropped (disconnect or replacement).

use crypto_box::aead::OsRng;
use crypto_box::{PublicKey, SecretKey};

use crate::error::{Result, WalletLinkError};

/// Length of an X25519 public or secret key
pub const KEY_LENGTH: usize = 32;

/// Dapp-side X25519 keypair for one connection attempt
///
/// Clone is NOT implemented: exactly one live keypair exists per provider.
pub struct EphemeralKeyPair {
    /// Zeroized on drop by `crypto_box`
    secret: SecretKey,
    public: PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a new keypair from OS entropy
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Rebuild a keypair from raw secret bytes
    pub fn from_secret_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn public_key_bytes(&self) -> [u8; KEY_LENGTH] {
        *self.public.as_bytes()
    }

    /// Public key as sent in `dapp_encryption_public_key`
    pub fn public_key_b58(&self) -> String {
        bs58::encode(self.public.as_bytes()).into_string()
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &self.public_key_b58())
            .finish_non_exhaustive()
    }
}

/// Parse a peer's X25519 public key from raw bytes
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey> {
    let array: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
        WalletLinkError::InvalidPublicKey(format!(
            "expected {} bytes, got {}",
            KEY_LENGTH,
            bytes.len()
        ))
    })?;
    Ok(PublicKey::from(array))
}

/// Parse a peer's X25519 public key from its base58 wire form
pub fn public_key_from_b58(encoded: &str) -> Result<PublicKey> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| WalletLinkError::InvalidEncoding { field: "public key" })?;
    public_key_from_bytes(&bytes)
}
