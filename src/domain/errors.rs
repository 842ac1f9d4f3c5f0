use thiserror::Error;

use crate::infrastructure::chain::ChainError;
use crate::infrastructure::persistence::DbError;

/// Error type for all engine operations.
///
/// Validation errors surface immediately and are never retried; contention
/// errors may be retried by the caller with a fresh draft; not-found errors
/// are distinguished from backend errors so callers can branch on them.
#[derive(Debug, Error)]
pub enum WalletError {
    // --- validation ---
    #[error("invalid xpub: {0}")]
    InvalidXpub(String),
    #[error("invalid transaction hex: {0}")]
    InvalidHex(String),
    #[error("invalid locking script: {0}")]
    InvalidLockingScript(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid op_return output: {0}")]
    InvalidOpReturnOutput(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("draft transaction configuration has no outputs")]
    MissingTransactionOutputs,
    #[error("output value is unrecognized")]
    OutputValueNotRecognized,
    #[error("output value is too low")]
    OutputValueTooLow,
    #[error("paymail address is invalid")]
    PaymailAddressIsInvalid,
    #[error("key derivation failed: {0}")]
    DerivationFailed(String),
    #[error("unsupported destination type: {0}")]
    UnsupportedDestinationType(String),

    // --- resource contention ---
    #[error("could not select enough outputs to satisfy transaction")]
    NotEnoughUtxos,
    #[error("utxo has already been spent")]
    UtxoAlreadySpent,
    #[error("transaction utxo has not been reserved for spending")]
    UtxoNotReserved,
    #[error("transaction draft id does not match utxo draft reservation id")]
    DraftIdMismatch,
    #[error("transaction has already been recorded")]
    TransactionAlreadyRecorded,

    // --- not found ---
    #[error("could not find xpub")]
    MissingXpub,
    #[error("xpub was not found but was expected")]
    MissingRequiredXpub,
    #[error("corresponding draft transaction not found")]
    DraftNotFound,
    #[error("could not find destination")]
    MissingDestination,
    #[error("unknown access key")]
    UnknownAccessKey,

    // --- recorder validation ---
    #[error("transaction outputs do not match any known destinations")]
    NoMatchingOutputs,
    #[error("xpub_id mismatch")]
    XpubIdMismatch,

    // --- fast-fail / unimplemented ---
    #[error("change strategy nominations not implemented yet")]
    ChangeStrategyNotImplemented,

    // --- authentication boundary ---
    #[error("missing authentication header")]
    MissingAuthHeader,
    #[error("signature missing")]
    MissingSignature,
    #[error("auth hash and body hash do not match")]
    AuthHashMismatch,
    #[error("signature has expired")]
    SignatureExpired,
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("access key has been revoked")]
    AccessKeyRevoked,

    // --- collaborators ---
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("paymail resolution failed: {0}")]
    PaymailResolution(String),

    // --- post-commit notification phase ---
    #[error("post-commit hook failed: {0}")]
    PostCommit(String),
}

impl WalletError {
    /// Not-found errors are surfaced differently by callers (e.g. a 404).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            WalletError::MissingXpub
                | WalletError::MissingRequiredXpub
                | WalletError::DraftNotFound
                | WalletError::MissingDestination
                | WalletError::UnknownAccessKey
        )
    }
}
