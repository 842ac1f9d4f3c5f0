pub mod access_key_repository;
pub mod destination_repository;
pub mod draft_transaction_repository;
pub mod transaction_repository;
pub mod utxo_repository;
pub mod xpub_repository;

pub use access_key_repository::AccessKeyRepository;
pub use destination_repository::DestinationRepository;
pub use draft_transaction_repository::DraftTransactionRepository;
pub use transaction_repository::TransactionRepository;
pub use utxo_repository::UtxoRepository;
pub use xpub_repository::{DerivationBranch, XpubRepository};

/// Collection of all repositories. Repositories hold no connection of
/// their own; every method takes the connection to run against, so the
/// same repository serves pool queries and in-transaction hook queries.
#[derive(Clone)]
pub struct Repositories {
    /// Repository for xpub account operations
    pub xpub: XpubRepository,
    /// Repository for destination operations
    pub destination: DestinationRepository,
    /// Repository for unspent output operations
    pub utxo: UtxoRepository,
    /// Repository for draft transaction operations
    pub draft_transaction: DraftTransactionRepository,
    /// Repository for recorded transaction operations
    pub transaction: TransactionRepository,
    /// Repository for access key operations
    pub access_key: AccessKeyRepository,
}

impl Repositories {
    pub fn new(utxo_page_size: u64) -> Self {
        Self {
            xpub: XpubRepository::new(),
            destination: DestinationRepository::new(),
            utxo: UtxoRepository::new(utxo_page_size),
            draft_transaction: DraftTransactionRepository::new(),
            transaction: TransactionRepository::new(),
            access_key: AccessKeyRepository::new(),
        }
    }
}
