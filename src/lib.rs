//! Transactional UTXO core for a non-custodial wallet backend.
//!
//! The engine tracks unspent outputs owned by hierarchically-derived keys
//! (xPubs), reserves inputs for draft transactions, and reconciles recorded
//! transactions back into account balances. All writes flow through a single
//! save pipeline (see [`infrastructure::persistence::orchestrator`]) so that
//! lifecycle hooks and transactional atomicity hold for every entity.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod utils;

pub use application::auth;
pub use application::engine::{Engine, EngineBuilder};
pub use config::EngineConfig;
pub use domain::errors::WalletError;
pub use domain::models::{
    AccessKey, ChangeStrategy, Destination, DraftStatus, DraftTransaction, FeeUnit, MapProtocol,
    OpReturn, ScriptOutput, Transaction, TransactionConfig, TransactionOutput, Utxo, UtxoPointer,
    Xpub,
};
pub use infrastructure::persistence::{DbError, DbPool};
pub use utils::scripts::ScriptType;
