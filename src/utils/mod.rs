pub mod keys;
pub mod logging;
pub mod op_return;
pub mod scripts;

use sha2::{Digest, Sha256};

/// Hex-encoded sha256 of the given string. Used for every derived id in the
/// engine (xpub ids, destination ids, utxo ids).
pub fn hash(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random 32-byte hex string, used as draft transaction ids.
pub fn random_hex_32() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Id of a utxo row: hash over `"{transaction_id}|{output_index}"`.
pub fn utxo_id(transaction_id: &str, output_index: u32) -> String {
    hash(&format!("{}|{}", transaction_id, output_index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash("test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn random_hex_is_64_chars_and_unique() {
        let a = random_hex_32();
        let b = random_hex_32();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn utxo_id_is_stable() {
        let a = utxo_id("abc", 0);
        let b = utxo_id("abc", 0);
        let c = utxo_id("abc", 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
