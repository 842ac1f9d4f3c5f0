pub mod access_key;
pub mod destination;
pub mod draft_transaction;
pub mod transaction;
pub mod transaction_config;
pub mod utxo;
pub mod xpub;

pub use access_key::AccessKey;
pub use destination::Destination;
pub use draft_transaction::{DraftStatus, DraftTransaction};
pub use transaction::Transaction;
pub use transaction_config::{
    ChangeStrategy, FeeUnit, MapProtocol, OpReturn, PaymailMetadata, ScriptOutput,
    TransactionConfig, TransactionInput, TransactionOutput, UtxoPointer,
};
pub use utxo::Utxo;
pub use xpub::Xpub;

use serde::{Deserialize, Serialize};

/// Runtime record state shared by every model: whether the struct is a new
/// row (insert) or was loaded from the datastore (update).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelState {
    new_record: bool,
}

impl ModelState {
    pub fn new_record() -> Self {
        Self { new_record: true }
    }

    pub fn existing() -> Self {
        Self { new_record: false }
    }

    pub fn is_new(&self) -> bool {
        self.new_record
    }

    pub fn mark_not_new(&mut self) {
        self.new_record = false;
    }
}
