//! Deep-link framing for the wallet universal-link protocol
//!
//! Outbound requests are GET-style URLs under `{base}/ul/v1/{method}`.
//! Inbound callbacks arrive on the app's custom scheme with either an
//! explicit error (`errorCode`, `errorMessage`) or an encrypted envelope.

use url::Url;

use crate::error::Result;
use crate::provider::{Cluster, ProviderConfig};

const PATH_CONNECT: &str = "ul/v1/connect";
const PATH_SIGN_AND_SEND: &str = "ul/v1/signAndSendTransaction";
const PATH_DISCONNECT: &str = "ul/v1/disconnect";

const PARAM_APP_URL: &str = "app_url";
const PARAM_DAPP_KEY: &str = "dapp_encryption_public_key";
const PARAM_REDIRECT: &str = "redirect_link";
const PARAM_CLUSTER: &str = "cluster";
const PARAM_NONCE: &str = "nonce";
const PARAM_DATA: &str = "data";
const PARAM_ERROR_CODE: &str = "errorCode";
const PARAM_ERROR_MESSAGE: &str = "errorMessage";

/// Fields shared by every outbound request
#[derive(Debug, Clone)]
pub struct RequestParams<'a> {
    pub app_url: &'a str,
    pub dapp_public_key_b58: &'a str,
    pub redirect_link: &'a Url,
    pub cluster: Cluster,
}

/// Classified inbound callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackFields {
    /// The wallet reported an error; no envelope to decrypt
    Error {
        code: String,
        message: Option<String>,
    },
    /// Encrypted envelope, all fields still base58
    Payload {
        ciphertext: String,
        nonce: String,
        /// Absent on some sign responses; required to complete a connect
        remote_public_key: Option<String>,
    },
    /// Not a wallet callback, or required fields missing
    Unrecognized,
}

/// Request path appended under the base URL
///
/// `join` replaces the last segment of a base without a trailing slash, so
/// `https://host/wallet` is treated as the directory `https://host/wallet/`.
fn endpoint(provider: &ProviderConfig, path: &str) -> Result<Url> {
    let mut base = Url::parse(&provider.base_url)?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    Ok(base.join(path)?)
}

fn append_common(url: &mut Url, params: &RequestParams<'_>) {
    url.query_pairs_mut()
        .append_pair(PARAM_APP_URL, params.app_url)
        .append_pair(PARAM_DAPP_KEY, params.dapp_public_key_b58)
        .append_pair(PARAM_REDIRECT, params.redirect_link.as_str())
        .append_pair(PARAM_CLUSTER, params.cluster.as_str());
}

/// `{base}/ul/v1/connect?app_url&dapp_encryption_public_key&redirect_link&cluster`
pub fn build_connect_url(provider: &ProviderConfig, params: &RequestParams<'_>) -> Result<Url> {
    let mut url = endpoint(provider, PATH_CONNECT)?;
    append_common(&mut url, params);
    Ok(url)
}

/// Connect parameters plus the encrypted `nonce` and `data`
pub fn build_sign_url(
    provider: &ProviderConfig,
    params: &RequestParams<'_>,
    nonce_b58: &str,
    data_b58: &str,
) -> Result<Url> {
    let mut url = endpoint(provider, PATH_SIGN_AND_SEND)?;
    append_common(&mut url, params);
    url.query_pairs_mut()
        .append_pair(PARAM_NONCE, nonce_b58)
        .append_pair(PARAM_DATA, data_b58);
    Ok(url)
}

/// Tells the wallet to forget the session; same framing as a sign request
pub fn build_disconnect_url(
    provider: &ProviderConfig,
    params: &RequestParams<'_>,
    nonce_b58: &str,
    data_b58: &str,
) -> Result<Url> {
    let mut url = endpoint(provider, PATH_DISCONNECT)?;
    append_common(&mut url, params);
    url.query_pairs_mut()
        .append_pair(PARAM_NONCE, nonce_b58)
        .append_pair(PARAM_DATA, data_b58);
    Ok(url)
}

/// Classify a callback URL for `provider`
///
/// Never fails: anything that is not a well-formed wallet response is
/// `Unrecognized`, since unrelated deep links share the same handler.
pub fn parse_callback(provider: &ProviderConfig, url: &str) -> CallbackFields {
    let url = match Url::parse(url) {
        Ok(url) => url,
        Err(_) => return CallbackFields::Unrecognized,
    };

    let mut error_code = None;
    let mut error_message = None;
    let mut nonce = None;
    let mut remote_key = None;
    // (priority, value) so the first configured payload key wins
    let mut payload: Option<(usize, String)> = None;

    for (key, value) in url.query_pairs() {
        let key = key.as_ref();
        if key == PARAM_ERROR_CODE {
            error_code = Some(value.into_owned());
        } else if key == PARAM_ERROR_MESSAGE {
            error_message = Some(value.into_owned());
        } else if key == PARAM_NONCE {
            nonce = Some(value.into_owned());
        } else if key == provider.remote_key_param {
            remote_key = Some(value.into_owned());
        } else if let Some(rank) = provider.payload_params.iter().position(|p| p == key) {
            if payload.as_ref().map_or(true, |(best, _)| rank < *best) {
                payload = Some((rank, value.into_owned()));
            }
        }
    }

    if let Some(code) = error_code.filter(|c| !c.is_empty()) {
        return CallbackFields::Error {
            code,
            message: error_message,
        };
    }

    match (payload, nonce) {
        (Some((_, ciphertext)), Some(nonce)) if !ciphertext.is_empty() && !nonce.is_empty() => {
            CallbackFields::Payload {
                ciphertext,
                nonce,
                remote_public_key: remote_key.filter(|k| !k.is_empty()),
            }
        }
        _ => CallbackFields::Unrecognized,
    }
}
