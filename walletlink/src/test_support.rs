//! Test doubles: an in-process wallet app and a recording dispatcher

use parking_lot::Mutex;
use serde_json::{json, Value};
use url::Url;

use crate::crypto::{
    decrypt_json, encrypt_json, public_key_from_b58, EphemeralKeyPair, Envelope, SharedSecret,
};
use crate::provider::{ProviderConfig, WalletProvider};
use crate::store::UrlDispatcher;

pub fn query(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Plays the wallet side of the protocol with a long-lived key
pub struct FakeWallet {
    keys: EphemeralKeyPair,
    config: ProviderConfig,
    payload_key: String,
}

impl FakeWallet {
    pub fn new(provider: WalletProvider) -> Self {
        Self::with_keys(provider, EphemeralKeyPair::generate())
    }

    pub fn with_keys(provider: WalletProvider, keys: EphemeralKeyPair) -> Self {
        let config = provider.default_config();
        let payload_key = config.payload_params[0].clone();
        Self {
            keys,
            config,
            payload_key,
        }
    }

    /// Answer with a different ciphertext key, e.g. Solflare's `payload` alias
    pub fn with_payload_key(mut self, key: &str) -> Self {
        self.payload_key = key.to_string();
        self
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.keys.public_key_bytes()
    }

    pub fn public_key_b58(&self) -> String {
        self.keys.public_key_b58()
    }

    fn shared_for(&self, request: &Url) -> SharedSecret {
        let dapp_key = query(request, "dapp_encryption_public_key").expect("request has dapp key");
        let dapp_key = public_key_from_b58(&dapp_key).expect("dapp key decodes");
        SharedSecret::derive(&self.keys, &dapp_key)
    }

    fn redirect(request: &Url) -> Url {
        let link = query(request, "redirect_link").expect("request has redirect link");
        Url::parse(&link).expect("redirect link parses")
    }

    fn respond(&self, request: &Url, payload: &Value, include_key: bool) -> String {
        let envelope = encrypt_json(&self.shared_for(request), payload).expect("encrypt");
        let mut callback = Self::redirect(request);
        {
            let mut pairs = callback.query_pairs_mut();
            if include_key {
                pairs.append_pair(&self.config.remote_key_param, &self.public_key_b58());
            }
            pairs
                .append_pair("nonce", &envelope.nonce_b58())
                .append_pair(&self.payload_key, &envelope.ciphertext_b58());
        }
        callback.to_string()
    }

    /// Approve a connect request
    pub fn approve_connect(&self, request: &Url, address: &str, session: &str) -> String {
        self.respond(request, &json!({ "public_key": address, "session": session }), true)
    }

    /// Approve a connect request with an arbitrary payload
    pub fn respond_connect_raw(&self, request: &Url, payload: Value) -> String {
        self.respond(request, &payload, true)
    }

    /// Decrypt the `{session, transaction}` body of a sign request
    pub fn open_sign_request(&self, request: &Url) -> Value {
        let envelope = Envelope::from_b58(
            &query(request, "data").expect("sign request has data"),
            &query(request, "nonce").expect("sign request has nonce"),
        )
        .expect("envelope decodes");
        decrypt_json(&self.shared_for(request), &envelope).expect("wallet can open request")
    }

    /// Approve a sign request, optionally echoing the wallet key
    pub fn approve_sign(&self, request: &Url, signature: &str, echo_key: bool) -> String {
        self.respond(request, &json!({ "signature": signature }), echo_key)
    }

    /// Reject any request with an explicit error code
    pub fn reject(request: &Url, code: &str, message: &str) -> String {
        let mut callback = Self::redirect(request);
        callback
            .query_pairs_mut()
            .append_pair("errorCode", code)
            .append_pair("errorMessage", message);
        callback.to_string()
    }
}

/// Records every dispatched URL; optionally fails the hand-off
#[derive(Default)]
pub struct RecordingDispatcher {
    pub opened: Mutex<Vec<Url>>,
    pub fail_with: Mutex<Option<String>>,
}

impl RecordingDispatcher {
    pub fn last(&self) -> Url {
        self.opened.lock().last().cloned().expect("a URL was dispatched")
    }

    pub fn count(&self) -> usize {
        self.opened.lock().len()
    }
}

impl UrlDispatcher for RecordingDispatcher {
    fn open(&self, url: &Url) -> Result<(), String> {
        if let Some(reason) = self.fail_with.lock().clone() {
            return Err(reason);
        }
        self.opened.lock().push(url.clone());
        Ok(())
    }
}

/// A base58 string shaped like a transaction signature
pub fn fake_signature() -> String {
    bs58::encode([0x5Au8; 64]).into_string()
}
