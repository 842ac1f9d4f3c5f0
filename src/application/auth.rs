//! Signature authentication for callers holding an xpriv or an access key.
//!
//! A payload signs `key || sha256(body) || nonce || timestamp`. Xpriv
//! callers sign with a child key derived from the body hash, so the
//! server can verify against the registered xpub without ever seeing a
//! private key. Access-key callers sign with the key itself.

use std::str::FromStr;

use bitcoin::bip32::{Xpriv, Xpub};
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::sign_message::{signed_msg_hash, MessageSignature};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::application::engine::Engine;
use crate::domain::errors::WalletError;
use crate::domain::models::AccessKey;
use crate::utils;
use crate::utils::keys;

/// How long a signature stays acceptable after `auth_time`.
pub const SIGNATURE_TTL_MILLIS: i64 = 20_000;

/// The signed authentication material carried with a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    /// Raw xpub of the caller, or the hex compressed public key of an
    /// access key
    pub xpub_key: String,
    /// sha256 of the request body
    pub auth_hash: String,
    pub auth_nonce: String,
    /// Unix millis at signing time
    pub auth_time: i64,
    /// Hex encoded 65-byte compact recoverable signature
    pub signature: String,
}

/// Sign a request body with an extended private key.
pub fn create_signature(hd_key: &Xpriv, body: &str) -> Result<AuthPayload, WalletError> {
    let secp = Secp256k1::new();
    let xpub_key = Xpub::from_priv(&secp, hd_key).to_string();
    let auth_hash = utils::hash(body);
    let signing_key = keys::derive_privkey_from_hex(hd_key, &auth_hash)?;
    sign_payload(xpub_key, auth_hash, &signing_key)
}

/// Sign a request body with an access key's private key.
pub fn create_access_key_signature(
    private_key_hex: &str,
    body: &str,
) -> Result<AuthPayload, WalletError> {
    let secp = Secp256k1::new();
    let signing_key = SecretKey::from_str(private_key_hex)
        .map_err(|e| WalletError::DerivationFailed(e.to_string()))?;
    let public_key = signing_key.public_key(&secp);
    sign_payload(
        hex::encode(public_key.serialize()),
        utils::hash(body),
        &signing_key,
    )
}

fn sign_payload(
    xpub_key: String,
    auth_hash: String,
    signing_key: &SecretKey,
) -> Result<AuthPayload, WalletError> {
    let secp = Secp256k1::new();
    let auth_nonce = utils::random_hex_32();
    let auth_time = Utc::now().timestamp_millis();

    let message = format!("{}{}{}{}", xpub_key, auth_hash, auth_nonce, auth_time);
    let msg_hash = signed_msg_hash(&message);
    let msg = Message::from_digest(msg_hash.to_byte_array());
    let signature = MessageSignature {
        signature: secp.sign_ecdsa_recoverable(&msg, signing_key),
        compressed: true,
    };

    Ok(AuthPayload {
        xpub_key,
        auth_hash,
        auth_nonce,
        auth_time,
        signature: hex::encode(signature.serialize()),
    })
}

/// Verify a payload signed by the holder of the xpriv behind `xpub_key`.
pub fn verify_xpub_signature(payload: &AuthPayload, body: &str) -> Result<(), WalletError> {
    check_payload(payload, body)?;
    let hd_key = keys::validate_xpub(&payload.xpub_key)?;
    let expected = keys::derive_pubkey_from_hex(&hd_key, &payload.auth_hash)?;
    verify_message(payload, &expected)
}

/// Verify a payload signed with an access key.
pub fn verify_access_key_signature(payload: &AuthPayload, body: &str) -> Result<(), WalletError> {
    check_payload(payload, body)?;
    let expected = PublicKey::from_str(&payload.xpub_key)
        .map_err(|_| WalletError::SignatureInvalid)?;
    verify_message(payload, &expected)
}

/// Full access-key authentication: signature check plus key lookup and
/// revocation check.
pub async fn authenticate_access_key(
    engine: &Engine,
    payload: &AuthPayload,
    body: &str,
) -> Result<AccessKey, WalletError> {
    verify_access_key_signature(payload, body)?;
    let access_key = engine.get_access_key(&utils::hash(&payload.xpub_key)).await?;
    if access_key.is_revoked() {
        return Err(WalletError::AccessKeyRevoked);
    }
    Ok(access_key)
}

fn check_payload(payload: &AuthPayload, body: &str) -> Result<(), WalletError> {
    if payload.signature.is_empty() {
        return Err(WalletError::MissingSignature);
    }
    if payload.auth_hash != utils::hash(body) {
        return Err(WalletError::AuthHashMismatch);
    }
    let age = Utc::now().timestamp_millis() - payload.auth_time;
    // Future-dated signatures are as invalid as stale ones
    if !(0..=SIGNATURE_TTL_MILLIS).contains(&age) {
        return Err(WalletError::SignatureExpired);
    }
    Ok(())
}

fn verify_message(payload: &AuthPayload, expected: &PublicKey) -> Result<(), WalletError> {
    let secp = Secp256k1::verification_only();
    let bytes = hex::decode(&payload.signature).map_err(|_| WalletError::SignatureInvalid)?;
    let signature =
        MessageSignature::from_slice(&bytes).map_err(|_| WalletError::SignatureInvalid)?;

    let message = format!(
        "{}{}{}{}",
        payload.xpub_key, payload.auth_hash, payload.auth_nonce, payload.auth_time
    );
    let msg_hash = signed_msg_hash(&message);
    let recovered = signature
        .recover_pubkey(&secp, msg_hash)
        .map_err(|_| WalletError::SignatureInvalid)?;

    if &recovered.inner != expected {
        return Err(WalletError::SignatureInvalid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP32 test vector 1 master key
    const TEST_XPRIV: &str = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";

    fn test_key() -> Xpriv {
        Xpriv::from_str(TEST_XPRIV).unwrap()
    }

    #[test]
    fn xpriv_signature_round_trip() {
        let body = r#"{"satoshis":1000}"#;
        let payload = create_signature(&test_key(), body).unwrap();
        verify_xpub_signature(&payload, body).unwrap();
    }

    #[test]
    fn rejects_tampered_body() {
        let payload = create_signature(&test_key(), "original").unwrap();
        assert!(matches!(
            verify_xpub_signature(&payload, "tampered"),
            Err(WalletError::AuthHashMismatch)
        ));
    }

    #[test]
    fn rejects_stale_signature() {
        let mut payload = create_signature(&test_key(), "body").unwrap();
        payload.auth_time -= SIGNATURE_TTL_MILLIS + 1;
        assert!(matches!(
            verify_xpub_signature(&payload, "body"),
            Err(WalletError::SignatureExpired)
        ));
    }

    #[test]
    fn rejects_missing_signature() {
        let mut payload = create_signature(&test_key(), "body").unwrap();
        payload.signature.clear();
        assert!(matches!(
            verify_xpub_signature(&payload, "body"),
            Err(WalletError::MissingSignature)
        ));
    }

    #[test]
    fn rejects_signature_from_another_key() {
        let body = "body";
        let payload = create_access_key_signature(
            // Some other secret key
            "0000000000000000000000000000000000000000000000000000000000000001",
            body,
        )
        .unwrap();
        let mut forged = create_signature(&test_key(), body).unwrap();
        forged.signature = payload.signature;
        assert!(matches!(
            verify_xpub_signature(&forged, body),
            Err(WalletError::SignatureInvalid)
        ));
    }

    #[test]
    fn access_key_signature_round_trip() {
        let body = "grab the key";
        let payload = create_access_key_signature(
            "0000000000000000000000000000000000000000000000000000000000000001",
            body,
        )
        .unwrap();
        verify_access_key_signature(&payload, body).unwrap();
    }
}
