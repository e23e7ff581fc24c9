//! Property-based tests for the envelope and callback handling
//!
//! Properties tested:
//! - Envelope correctness: either side of a key agreement opens the other's box
//! - Wrong recipient rejection: a third key never opens the box
//! - Tamper rejection: any flipped ciphertext bit fails authentication
//! - Callback parsing and handling never panic on arbitrary input

#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;

    use crate::crypto::{decrypt, encrypt, EphemeralKeyPair, Envelope, SharedSecret};
    use crate::deeplink::{parse_callback, CallbackFields};
    use crate::error::WalletLinkError;
    use crate::provider::{AppIdentity, WalletProvider};
    use crate::state::{CallbackOutcome, WalletSession};

    fn secret() -> impl Strategy<Value = [u8; 32]> {
        prop::array::uniform32(any::<u8>())
    }

    fn distinct_secrets() -> impl Strategy<Value = ([u8; 32], [u8; 32], [u8; 32])> {
        (secret(), secret(), secret())
            .prop_filter("distinct secrets", |(a, b, c)| a != b && b != c && a != c)
    }

    fn provider() -> impl Strategy<Value = WalletProvider> {
        prop_oneof![Just(WalletProvider::Phantom), Just(WalletProvider::Solflare)]
    }

    fn b58_text() -> impl Strategy<Value = String> {
        prop::collection::vec(any::<u8>(), 0..96).prop_map(|bytes| bs58::encode(bytes).into_string())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: Envelope Correctness
        /// Whatever the dapp seals for the wallet, the wallet opens, and back.
        #[test]
        fn prop_envelope_roundtrip(
            (dapp_secret, wallet_secret, _) in distinct_secrets(),
            plaintext in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let dapp = EphemeralKeyPair::from_secret_bytes(dapp_secret);
            let wallet = EphemeralKeyPair::from_secret_bytes(wallet_secret);
            let dapp_side = SharedSecret::derive(&dapp, &wallet.public_key());
            let wallet_side = SharedSecret::derive(&wallet, &dapp.public_key());

            let sealed = encrypt(&dapp_side, &plaintext).unwrap();
            prop_assert_eq!(decrypt(&wallet_side, &sealed).unwrap(), plaintext.clone());

            let reply = encrypt(&wallet_side, &plaintext).unwrap();
            prop_assert_eq!(decrypt(&dapp_side, &reply).unwrap(), plaintext);
        }

        /// Property: Wire Form Survives
        /// Base58 encoding of the envelope loses nothing.
        #[test]
        fn prop_envelope_b58_roundtrip(
            (a, b, _) in distinct_secrets(),
            plaintext in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            let a = EphemeralKeyPair::from_secret_bytes(a);
            let b = EphemeralKeyPair::from_secret_bytes(b);
            let shared = SharedSecret::derive(&a, &b.public_key());

            let sealed = encrypt(&shared, &plaintext).unwrap();
            let wire = Envelope::from_b58(&sealed.ciphertext_b58(), &sealed.nonce_b58()).unwrap();
            prop_assert_eq!(decrypt(&shared, &wire).unwrap(), plaintext);
        }

        /// Property: Wrong Recipient Rejection
        /// A party outside the key agreement cannot open the box.
        #[test]
        fn prop_wrong_recipient_rejection(
            (dapp_secret, wallet_secret, other_secret) in distinct_secrets(),
            plaintext in prop::collection::vec(any::<u8>(), 1..128),
        ) {
            let dapp = EphemeralKeyPair::from_secret_bytes(dapp_secret);
            let wallet = EphemeralKeyPair::from_secret_bytes(wallet_secret);
            let other = EphemeralKeyPair::from_secret_bytes(other_secret);

            let sealed = encrypt(&SharedSecret::derive(&dapp, &wallet.public_key()), &plaintext).unwrap();
            let eavesdropper = SharedSecret::derive(&other, &dapp.public_key());
            prop_assert!(matches!(
                decrypt(&eavesdropper, &sealed),
                Err(WalletLinkError::DecryptionFailed)
            ));
        }

        /// Property: Tamper Rejection
        #[test]
        fn prop_flipped_bit_rejected(
            (a, b, _) in distinct_secrets(),
            plaintext in prop::collection::vec(any::<u8>(), 0..128),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let a = EphemeralKeyPair::from_secret_bytes(a);
            let b = EphemeralKeyPair::from_secret_bytes(b);
            let shared = SharedSecret::derive(&a, &b.public_key());

            let mut sealed = encrypt(&shared, &plaintext).unwrap();
            let i = position.index(sealed.ciphertext.len());
            sealed.ciphertext[i] ^= 1 << bit;
            prop_assert!(decrypt(&shared, &sealed).is_err());
        }

        /// Property: Fresh Nonces
        #[test]
        fn prop_nonces_differ((a, b, _) in distinct_secrets()) {
            let a = EphemeralKeyPair::from_secret_bytes(a);
            let b = EphemeralKeyPair::from_secret_bytes(b);
            let shared = SharedSecret::derive(&a, &b.public_key());

            let first = encrypt(&shared, b"same").unwrap();
            let second = encrypt(&shared, b"same").unwrap();
            prop_assert_ne!(first.nonce, second.nonce);
            prop_assert_ne!(first.ciphertext, second.ciphertext);
        }

        /// Property: parse_callback is total
        #[test]
        fn prop_parse_callback_never_panics(provider in provider(), url in ".{0,200}") {
            let _ = parse_callback(&provider.default_config(), &url);
        }

        /// Property: an errorCode always wins over an envelope
        #[test]
        fn prop_error_code_short_circuits(
            provider in provider(),
            code in "[A-Za-z0-9-]{1,16}",
            data in b58_text(),
            nonce in b58_text(),
        ) {
            let mut url = url::Url::parse("walletlink://phantom/onConnect").unwrap();
            url.query_pairs_mut()
                .append_pair("data", &data)
                .append_pair("nonce", &nonce)
                .append_pair("errorCode", &code);
            let fields = parse_callback(&provider.default_config(), url.as_str());
            prop_assert_eq!(fields, CallbackFields::Error { code, message: None });
        }

        /// Property: Garbage Envelopes Never Connect
        /// Random ciphertext for an outstanding connect is ignored and leaves
        /// the attempt open for the real response.
        #[test]
        fn prop_random_envelope_never_connects(
            provider in provider(),
            wallet_secret in secret(),
            data in b58_text(),
            nonce in b58_text(),
        ) {
            let config = provider.default_config();
            let mut session = WalletSession::new(provider, config.clone(), AppIdentity::default());
            session.connect().unwrap();
            let before = session.state().clone();
            let dapp_key = session.dapp_public_key_b58();

            let wallet = EphemeralKeyPair::from_secret_bytes(wallet_secret);
            let mut url = url::Url::parse("walletlink://cb/onConnect").unwrap();
            url.query_pairs_mut()
                .append_pair(&config.remote_key_param, &wallet.public_key_b58())
                .append_pair("nonce", &nonce)
                .append_pair("data", &data);

            prop_assert_eq!(session.handle_callback(url.as_str()), CallbackOutcome::Ignored);
            prop_assert_eq!(session.state(), &before);
            prop_assert_eq!(session.dapp_public_key_b58(), dapp_key);
        }
    }
}
