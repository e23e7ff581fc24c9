//! Connect/sign lifecycle for one wallet provider
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> AwaitingSignature -> Connected
//!                      \             \               \
//!                       +-------------+---------------+--> Error
//! ```
//!
//! The machine never performs I/O. Operations that talk to the wallet return
//! the URL to hand off; inbound callback URLs are fed back through
//! [`WalletSession::handle_callback`].

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use url::Url;

use super::session_state::{ConnectionStatus, ProviderSessionState};
use crate::crypto::{
    decrypt_json, encrypt_json, public_key_from_b58, EphemeralKeyPair, Envelope, SharedSecret,
};
use crate::deeplink::{
    build_connect_url, build_disconnect_url, build_sign_url, parse_callback, CallbackFields,
    RequestParams,
};
use crate::error::{ErrorDescriptor, ErrorKind, Result, WalletLinkError};
use crate::provider::{AppIdentity, ProviderConfig, RedirectAction, WalletProvider};

/// Decrypted wallet response
#[derive(Debug, Deserialize)]
struct WalletResponse {
    #[serde(default)]
    public_key: Option<String>,
    #[serde(default)]
    session: Option<String>,
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Serialize)]
struct SignRequestPayload<'a> {
    session: &'a str,
    transaction: String,
}

#[derive(Serialize)]
struct DisconnectPayload<'a> {
    session: &'a str,
}

/// What happened to an inbound callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The callback drove a state transition
    Applied,
    /// Unrelated link, malformed callback, a connect payload that cannot be
    /// opened with the live keypair, or nothing for it to act on
    Ignored,
}

/// Key material of the current connection attempt
///
/// The shared secret only exists alongside the keypair it was derived
/// from, so dropping this drops both.
struct LinkKeys {
    keypair: EphemeralKeyPair,
    shared: Option<SharedSecret>,
}

/// Session state machine for one wallet provider
pub struct WalletSession {
    provider: WalletProvider,
    config: ProviderConfig,
    app: AppIdentity,
    keys: Option<LinkKeys>,
    state: ProviderSessionState,
}

impl WalletSession {
    pub fn new(provider: WalletProvider, config: ProviderConfig, app: AppIdentity) -> Self {
        Self {
            provider,
            config,
            app,
            keys: None,
            state: ProviderSessionState::default(),
        }
    }

    pub fn provider(&self) -> WalletProvider {
        self.provider
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn state(&self) -> &ProviderSessionState {
        &self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.connection_status
    }

    /// Base58 public key of the live ephemeral keypair, if any
    pub fn dapp_public_key_b58(&self) -> Option<String> {
        self.keys.as_ref().map(|k| k.keypair.public_key_b58())
    }

    fn shared_secret(&self) -> Option<&SharedSecret> {
        self.keys.as_ref().and_then(|k| k.shared.as_ref())
    }

    fn request_params<'a>(&'a self, dapp_key: &'a str, redirect: &'a Url) -> RequestParams<'a> {
        RequestParams {
            app_url: &self.app.app_url,
            dapp_public_key_b58: dapp_key,
            redirect_link: redirect,
            cluster: self.app.cluster,
        }
    }

    // ========================================================================
    // User actions
    // ========================================================================

    /// Start a new connection attempt and return the URL to hand off
    ///
    /// Any previous keypair is dropped first, so callbacks encrypted for an
    /// earlier attempt can no longer be opened.
    pub fn connect(&mut self) -> Result<Url> {
        self.keys = None;
        self.state.reset();

        let keypair = EphemeralKeyPair::generate();
        let dapp_key = keypair.public_key_b58();
        let redirect = self.app.redirect_link(&self.config, RedirectAction::Connect)?;
        let url = build_connect_url(&self.config, &self.request_params(&dapp_key, &redirect))?;

        self.keys = Some(LinkKeys {
            keypair,
            shared: None,
        });
        self.state.connection_status = ConnectionStatus::Connecting;
        info!(provider = %self.provider, dapp_key = %dapp_key, "connect request built");
        Ok(url)
    }

    /// Build a signAndSendTransaction request for unsigned transaction bytes
    ///
    /// Reuses the shared secret from connect; no new keypair is generated.
    pub fn request_signature(&mut self, unsigned_transaction: &[u8]) -> Result<Url> {
        let status = self.status();
        let allowed = matches!(
            status,
            ConnectionStatus::Connected | ConnectionStatus::AwaitingSignature | ConnectionStatus::Error
        );
        if !allowed || !self.state.is_session_established() || self.shared_secret().is_none() {
            let err = WalletLinkError::SessionNotEstablished;
            warn!(provider = %self.provider, %status, "signature requested without a session");
            self.state.last_error = Some(err.descriptor());
            return Err(err);
        }
        let (Some(session_token), Some(shared), Some(dapp_key)) = (
            self.state.session_token.as_deref(),
            self.shared_secret(),
            self.dapp_public_key_b58(),
        ) else {
            return Err(WalletLinkError::SessionNotEstablished);
        };

        if status == ConnectionStatus::AwaitingSignature {
            debug!(provider = %self.provider, "superseding outstanding signature request");
        }

        let payload = SignRequestPayload {
            session: session_token,
            transaction: self.config.transaction_encoding.encode(unsigned_transaction),
        };
        let envelope = encrypt_json(shared, &payload)?;
        let redirect = self
            .app
            .redirect_link(&self.config, RedirectAction::SignAndSendTransaction)?;
        let url = build_sign_url(
            &self.config,
            &self.request_params(&dapp_key, &redirect),
            &envelope.nonce_b58(),
            &envelope.ciphertext_b58(),
        )?;

        self.state.last_error = None;
        self.state.connection_status = ConnectionStatus::AwaitingSignature;
        info!(
            provider = %self.provider,
            tx_len = unsigned_transaction.len(),
            "signature request built"
        );
        Ok(url)
    }

    /// Encrypted request asking the wallet to end its side of the session
    ///
    /// `None` when there is no established session to end.
    pub fn disconnect_request(&self) -> Result<Option<Url>> {
        let (Some(token), Some(shared), Some(dapp_key)) = (
            self.state.session_token.as_deref(),
            self.shared_secret(),
            self.dapp_public_key_b58(),
        ) else {
            return Ok(None);
        };

        let envelope = encrypt_json(shared, &DisconnectPayload { session: token })?;
        let redirect = self.app.redirect_link(&self.config, RedirectAction::Disconnect)?;
        let url = build_disconnect_url(
            &self.config,
            &self.request_params(&dapp_key, &redirect),
            &envelope.nonce_b58(),
            &envelope.ciphertext_b58(),
        )?;
        Ok(Some(url))
    }

    /// Forget the session and its keys, from any state
    pub fn disconnect(&mut self) {
        self.keys = None;
        self.state.reset();
        info!(provider = %self.provider, "disconnected");
    }

    /// The hand-off for the outstanding request could not be performed
    pub fn dispatch_failed(&mut self, reason: &str) {
        let descriptor = WalletLinkError::DispatchFailed(reason.to_string()).descriptor();
        match self.status() {
            ConnectionStatus::Connecting => self.fail_connect(descriptor),
            ConnectionStatus::AwaitingSignature => self.fail_attempt(descriptor),
            status => {
                debug!(provider = %self.provider, %status, "dispatch failure with nothing outstanding");
            }
        }
    }

    /// Give up on the outstanding request. Returns false if nothing was pending.
    pub fn time_out(&mut self) -> bool {
        match self.status() {
            ConnectionStatus::Connecting => self.fail_connect(ErrorDescriptor::timed_out()),
            ConnectionStatus::AwaitingSignature => self.fail_attempt(ErrorDescriptor::timed_out()),
            _ => return false,
        }
        true
    }

    // ========================================================================
    // Inbound callbacks
    // ========================================================================

    /// Apply an inbound callback URL
    pub fn handle_callback(&mut self, url: &str) -> CallbackOutcome {
        match parse_callback(&self.config, url) {
            CallbackFields::Unrecognized => {
                debug!(provider = %self.provider, "ignoring unrecognized deep link");
                CallbackOutcome::Ignored
            }
            CallbackFields::Error { code, message } => {
                let status = self.status();
                if status == ConnectionStatus::Disconnected {
                    // Expected race: the attempt this answers was cancelled
                    debug!(provider = %self.provider, %code, "error callback after disconnect ignored");
                    return CallbackOutcome::Ignored;
                }
                let descriptor = ErrorDescriptor::from_callback(&code, message.as_deref());
                info!(provider = %self.provider, %status, kind = ?descriptor.kind, %code, "wallet returned error");
                self.state.last_raw_callback_url = Some(url.to_string());
                if status == ConnectionStatus::Connecting {
                    self.fail_connect(descriptor);
                } else {
                    // Session fields from an earlier connect stay usable
                    self.fail_attempt(descriptor);
                }
                CallbackOutcome::Applied
            }
            CallbackFields::Payload {
                ciphertext,
                nonce,
                remote_public_key,
            } => match self.status() {
                ConnectionStatus::Connecting => {
                    self.complete_connect(url, &ciphertext, &nonce, remote_public_key.as_deref())
                }
                ConnectionStatus::AwaitingSignature => {
                    self.complete_signature(url, &ciphertext, &nonce, remote_public_key.as_deref())
                }
                ConnectionStatus::Disconnected => {
                    // Expected race: the attempt this answers was cancelled
                    debug!(provider = %self.provider, "payload callback after disconnect ignored");
                    CallbackOutcome::Ignored
                }
                status => {
                    debug!(provider = %self.provider, %status, "payload callback with no outstanding request");
                    CallbackOutcome::Ignored
                }
            },
        }
    }

    fn complete_connect(
        &mut self,
        url: &str,
        ciphertext: &str,
        nonce: &str,
        remote_key_b58: Option<&str>,
    ) -> CallbackOutcome {
        let Some(remote_key_b58) = remote_key_b58 else {
            debug!(provider = %self.provider, "connect callback without wallet key ignored");
            return CallbackOutcome::Ignored;
        };
        let Some(keys) = self.keys.as_ref() else {
            return CallbackOutcome::Ignored;
        };

        let opened = public_key_from_b58(remote_key_b58).and_then(|remote_key| {
            let shared = SharedSecret::derive(&keys.keypair, &remote_key);
            let envelope = Envelope::from_b58(ciphertext, nonce)?;
            let response: WalletResponse = decrypt_json(&shared, &envelope)?;
            let (address, session) = validate_connect_response(response)?;
            Ok((remote_key, shared, address, session))
        });

        if let Err(e) = &opened {
            if e.kind() == ErrorKind::DecryptionFailed {
                // Answer to a superseded attempt, or forged; the live keypair
                // may still receive the real response
                debug!(provider = %self.provider, error = %e, "connect callback not for this keypair ignored");
                return CallbackOutcome::Ignored;
            }
        }
        self.state.last_raw_callback_url = Some(url.to_string());

        match opened {
            Ok((remote_key, shared, address, session)) => {
                if let Some(keys) = self.keys.as_mut() {
                    keys.shared = Some(shared);
                }
                self.state.remote_public_key = Some(*remote_key.as_bytes());
                self.state.session_token = Some(session);
                self.state.wallet_address = Some(address);
                self.state.last_error = None;
                self.state.connection_status = ConnectionStatus::Connected;
                info!(
                    provider = %self.provider,
                    wallet = self.state.wallet_address.as_deref().unwrap_or_default(),
                    "wallet connected"
                );
            }
            Err(e) => {
                warn!(provider = %self.provider, error = %e, "connect response rejected");
                self.fail_connect(e.descriptor());
            }
        }
        CallbackOutcome::Applied
    }

    fn complete_signature(
        &mut self,
        url: &str,
        ciphertext: &str,
        nonce: &str,
        remote_key_b58: Option<&str>,
    ) -> CallbackOutcome {
        let (Some(shared), Some(stored_key)) = (self.shared_secret(), self.state.remote_public_key)
        else {
            return CallbackOutcome::Ignored;
        };

        let opened = check_remote_key(remote_key_b58, &stored_key).and_then(|_| {
            let envelope = Envelope::from_b58(ciphertext, nonce)?;
            let response: WalletResponse = decrypt_json(shared, &envelope)?;
            validate_sign_response(response)
        });
        self.state.last_raw_callback_url = Some(url.to_string());

        match opened {
            Ok(signature) => {
                info!(provider = %self.provider, %signature, "transaction signed");
                self.state.last_signature = Some(signature);
                self.state.last_error = None;
                self.state.connection_status = ConnectionStatus::Connected;
            }
            Err(e) => {
                warn!(provider = %self.provider, error = %e, "sign response rejected");
                self.fail_attempt(e.descriptor());
            }
        }
        CallbackOutcome::Applied
    }

    /// A connect attempt ended without a session
    fn fail_connect(&mut self, descriptor: ErrorDescriptor) {
        self.keys = None;
        self.state.reset();
        self.state.connection_status = ConnectionStatus::Error;
        self.state.last_error = Some(descriptor);
    }

    /// A sign attempt failed; the established session is kept
    fn fail_attempt(&mut self, descriptor: ErrorDescriptor) {
        self.state.connection_status = ConnectionStatus::Error;
        self.state.last_error = Some(descriptor);
    }
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("provider", &self.provider)
            .field("status", &self.state.connection_status)
            .field("dapp_key", &self.dapp_public_key_b58())
            .finish_non_exhaustive()
    }
}

fn validate_connect_response(response: WalletResponse) -> Result<(String, String)> {
    let address = response
        .public_key
        .ok_or_else(|| WalletLinkError::Protocol("connect response missing public_key".into()))?;
    let session = response
        .session
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WalletLinkError::Protocol("connect response missing session".into()))?;
    if !is_base58(&address) {
        return Err(WalletLinkError::Protocol(format!("invalid wallet address '{}'", address)));
    }
    Ok((address, session))
}

fn validate_sign_response(response: WalletResponse) -> Result<String> {
    let signature = response
        .signature
        .ok_or_else(|| WalletLinkError::Protocol("sign response missing signature".into()))?;
    if !is_base58(&signature) {
        return Err(WalletLinkError::Protocol("invalid transaction signature".into()));
    }
    Ok(signature)
}

fn is_base58(value: &str) -> bool {
    !value.is_empty() && bs58::decode(value).into_vec().is_ok()
}

/// A wallet key echoed on a sign response must be the one from connect
fn check_remote_key(echoed_b58: Option<&str>, stored: &[u8; 32]) -> Result<()> {
    let Some(echoed_b58) = echoed_b58 else {
        return Ok(());
    };
    let echoed = public_key_from_b58(echoed_b58)?;
    if bool::from(echoed.as_bytes().ct_eq(stored)) {
        Ok(())
    } else {
        Err(WalletLinkError::Protocol(
            "wallet encryption key changed since connect".into(),
        ))
    }
}
