pub mod access_keys;
pub mod destinations;
pub mod draft_transactions;
pub mod transactions;
pub mod utxos;
pub mod xpubs;
