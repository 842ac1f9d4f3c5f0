use thiserror::Error;

/// Errors surfaced by on-chain providers and the racing service.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain provider connection error: {0}")]
    Connection(String),
    #[error("chain provider rpc error: {0}")]
    Rpc(String),
    #[error("broadcast failed: {0}")]
    Broadcast(String),
    #[error("transaction {0} not found on chain")]
    TransactionNotFound(String),
    #[error("no chain providers configured")]
    NoProviders,
    #[error("chain query timed out")]
    Timeout,
}

impl From<bitcoincore_rpc::Error> for ChainError {
    fn from(err: bitcoincore_rpc::Error) -> Self {
        ChainError::Rpc(err.to_string())
    }
}
