//! Authenticated encryption envelope for wallet round trips
//!
//! crypto_box (X25519 + XSalsa20-Poly1305). The shared secret is precomputed
//! once per connection and reused for every request/response in the session.
//! Every encryption draws a fresh 24-byte nonce from the OS RNG.

use crypto_box::aead::{generic_array::GenericArray, Aead, AeadCore, OsRng};
use crypto_box::{PublicKey, SalsaBox};
use serde::{de::DeserializeOwned, Serialize};
use zeroize::Zeroizing;

use super::keys::EphemeralKeyPair;
use crate::error::{Result, WalletLinkError};

/// Nonce length fixed by XSalsa20-Poly1305
pub const NONCE_LENGTH: usize = 24;

/// Precomputed box key derived from our secret key and the wallet's public key
pub struct SharedSecret {
    inner: SalsaBox,
}

impl SharedSecret {
    /// Diffie-Hellman between a local secret key and the remote public key
    pub fn derive(local: &EphemeralKeyPair, remote_public_key: &PublicKey) -> Self {
        Self {
            inner: SalsaBox::new(remote_public_key, local.secret_key()),
        }
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Ciphertext and nonce of one encrypted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LENGTH],
}

impl Envelope {
    pub fn ciphertext_b58(&self) -> String {
        bs58::encode(&self.ciphertext).into_string()
    }

    pub fn nonce_b58(&self) -> String {
        bs58::encode(self.nonce).into_string()
    }

    /// Decode the base58 `data`/`nonce` pair carried by a callback
    pub fn from_b58(ciphertext: &str, nonce: &str) -> Result<Self> {
        let ciphertext = bs58::decode(ciphertext)
            .into_vec()
            .map_err(|_| WalletLinkError::InvalidEncoding { field: "data" })?;
        let nonce_bytes = bs58::decode(nonce)
            .into_vec()
            .map_err(|_| WalletLinkError::InvalidEncoding { field: "nonce" })?;
        let nonce: [u8; NONCE_LENGTH] = nonce_bytes
            .try_into()
            .map_err(|_| WalletLinkError::InvalidEncoding { field: "nonce" })?;
        Ok(Self { ciphertext, nonce })
    }
}

/// Encrypt raw bytes under a fresh random nonce
pub fn encrypt(secret: &SharedSecret, plaintext: &[u8]) -> Result<Envelope> {
    let nonce = SalsaBox::generate_nonce(&mut OsRng);
    let ciphertext = secret
        .inner
        .encrypt(&nonce, plaintext)
        .map_err(|_| WalletLinkError::Protocol("encryption failed".into()))?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    nonce_bytes.copy_from_slice(nonce.as_slice());
    Ok(Envelope {
        ciphertext,
        nonce: nonce_bytes,
    })
}

/// Open an envelope. Any authentication failure is `DecryptionFailed`.
pub fn decrypt(secret: &SharedSecret, envelope: &Envelope) -> Result<Vec<u8>> {
    let nonce = GenericArray::clone_from_slice(&envelope.nonce);
    secret
        .inner
        .decrypt(&nonce, envelope.ciphertext.as_slice())
        .map_err(|_| WalletLinkError::DecryptionFailed)
}

/// Serialize `payload` to UTF-8 JSON and encrypt it
///
/// The plaintext carries the session token and is wiped once sealed.
pub fn encrypt_json<T: Serialize>(secret: &SharedSecret, payload: &T) -> Result<Envelope> {
    let plaintext = Zeroizing::new(serde_json::to_vec(payload)?);
    encrypt(secret, &plaintext)
}

/// Decrypt and parse a JSON payload
///
/// Authentication failures are `DecryptionFailed`; an authenticated payload
/// that does not parse is a protocol error.
pub fn decrypt_json<T: DeserializeOwned>(secret: &SharedSecret, envelope: &Envelope) -> Result<T> {
    let plaintext = Zeroizing::new(decrypt(secret, envelope)?);
    serde_json::from_slice(&plaintext)
        .map_err(|e| WalletLinkError::Protocol(format!("invalid payload JSON: {}", e)))
}
