use std::str::FromStr;

use bitcoin::bip32::{ChildNumber, Xpriv, Xpub};
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::{Address, Network};

use crate::domain::errors::WalletError;

/// Derivation branch for receiving addresses.
pub const CHAIN_EXTERNAL: u32 = 0;
/// Derivation branch for change addresses.
pub const CHAIN_INTERNAL: u32 = 1;

/// Serialized extended public keys are always this many characters.
const XPUB_KEY_LENGTH: usize = 111;

/// Validate and parse a raw extended public key.
pub fn validate_xpub(raw_key: &str) -> Result<Xpub, WalletError> {
    if raw_key.len() != XPUB_KEY_LENGTH {
        return Err(WalletError::InvalidXpub(format!(
            "invalid length {}, expected {}",
            raw_key.len(),
            XPUB_KEY_LENGTH
        )));
    }
    let hd_key = Xpub::from_str(raw_key).map_err(|e| WalletError::InvalidXpub(e.to_string()))?;
    // Sanity check on the round trip
    if hd_key.to_string() != raw_key {
        return Err(WalletError::InvalidXpub("key does not round-trip".to_string()));
    }
    Ok(hd_key)
}

/// Derive the address and hex locking script at `chain/num` below the key.
pub fn derive_address(
    hd_key: &Xpub,
    chain: u32,
    num: u32,
    network: Network,
) -> Result<(String, String), WalletError> {
    let secp = Secp256k1::verification_only();
    let path = [
        ChildNumber::from_normal_idx(chain)
            .map_err(|e| WalletError::DerivationFailed(e.to_string()))?,
        ChildNumber::from_normal_idx(num)
            .map_err(|e| WalletError::DerivationFailed(e.to_string()))?,
    ];
    let child = hd_key
        .derive_pub(&secp, &path)
        .map_err(|e| WalletError::DerivationFailed(e.to_string()))?;
    let address = Address::p2pkh(child.to_pub(), network);
    let script = hex::encode(address.script_pubkey().as_bytes());
    Ok((address.to_string(), script))
}

/// Derive a child public key using a hex hash as the derivation path: the
/// hash is consumed in 8-character chunks, each parsed as a (non-hardened)
/// child index. Used by the signature-auth boundary, where the path is the
/// sha256 of the request body.
pub fn derive_pubkey_from_hex(hd_key: &Xpub, hex_hash: &str) -> Result<PublicKey, WalletError> {
    let secp = Secp256k1::verification_only();
    let path = child_nums_from_hex(hex_hash)?;
    let child = hd_key
        .derive_pub(&secp, &path)
        .map_err(|e| WalletError::DerivationFailed(e.to_string()))?;
    Ok(child.public_key)
}

/// Private-key counterpart of [`derive_pubkey_from_hex`], used by clients
/// creating signatures.
pub fn derive_privkey_from_hex(hd_key: &Xpriv, hex_hash: &str) -> Result<SecretKey, WalletError> {
    let secp = Secp256k1::new();
    let path = child_nums_from_hex(hex_hash)?;
    let child = hd_key
        .derive_priv(&secp, &path)
        .map_err(|e| WalletError::DerivationFailed(e.to_string()))?;
    Ok(child.private_key)
}

fn child_nums_from_hex(hex_hash: &str) -> Result<Vec<ChildNumber>, WalletError> {
    if hex_hash.is_empty() || !hex_hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::DerivationFailed(format!(
            "invalid derivation hex: {}",
            hex_hash
        )));
    }
    let mut nums = Vec::new();
    let bytes = hex_hash.as_bytes();
    for chunk in bytes.chunks(8) {
        let part = std::str::from_utf8(chunk).expect("hex is ascii");
        let raw = u32::from_str_radix(part, 16)
            .map_err(|e| WalletError::DerivationFailed(e.to_string()))?;
        // Clear the hardened bit; only public derivation is possible here
        let num = ChildNumber::from_normal_idx(raw & 0x7FFF_FFFF)
            .map_err(|e| WalletError::DerivationFailed(e.to_string()))?;
        nums.push(num);
    }
    Ok(nums)
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP32 test vector 1 master key
    const TEST_XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";

    #[test]
    fn validates_a_good_key() {
        let key = validate_xpub(TEST_XPUB).unwrap();
        assert_eq!(key.to_string(), TEST_XPUB);
    }

    #[test]
    fn rejects_bad_length() {
        let err = validate_xpub("xpub123").unwrap_err();
        assert!(matches!(err, WalletError::InvalidXpub(_)));
    }

    #[test]
    fn rejects_bad_encoding() {
        let mangled = format!("a{}", &TEST_XPUB[1..]);
        assert!(validate_xpub(&mangled).is_err());
    }

    #[test]
    fn derives_stable_addresses_per_branch() {
        let key = validate_xpub(TEST_XPUB).unwrap();
        let (external, ext_script) =
            derive_address(&key, CHAIN_EXTERNAL, 0, Network::Bitcoin).unwrap();
        let (internal, int_script) =
            derive_address(&key, CHAIN_INTERNAL, 0, Network::Bitcoin).unwrap();
        assert_ne!(external, internal);
        assert_ne!(ext_script, int_script);

        // Same path derives the same address
        let (external2, _) = derive_address(&key, CHAIN_EXTERNAL, 0, Network::Bitcoin).unwrap();
        assert_eq!(external, external2);
    }

    #[test]
    fn hex_derivation_path_is_stable() {
        let key = validate_xpub(TEST_XPUB).unwrap();
        let hash = crate::utils::hash("body");
        let a = derive_pubkey_from_hex(&key, &hash).unwrap();
        let b = derive_pubkey_from_hex(&key, &hash).unwrap();
        assert_eq!(a, b);

        let c = derive_pubkey_from_hex(&key, &crate::utils::hash("other")).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn hex_derivation_rejects_garbage() {
        let key = validate_xpub(TEST_XPUB).unwrap();
        assert!(derive_pubkey_from_hex(&key, "not-hex").is_err());
        assert!(derive_pubkey_from_hex(&key, "").is_err());
    }
}
