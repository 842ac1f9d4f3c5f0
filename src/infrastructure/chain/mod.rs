//! On-chain lookups and broadcasting over a set of interchangeable
//! providers. The service can race providers for the fastest answer or
//! demand agreement from all of them.

pub mod error;
pub mod providers;

pub use error::ChainError;
pub use providers::NodeProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{join_all, select_ok};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What a provider knows about a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub id: String,
    pub block_hash: Option<String>,
    pub block_height: Option<u64>,
    pub confirmations: Option<u64>,
    /// Which provider answered
    pub provider: String,
}

/// How many providers have to answer before a query resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPolicy {
    /// First successful answer wins
    FastestAny,
    /// Every provider must know the transaction
    AllProviders,
}

/// Trait for on-chain data sources (node RPC, indexer APIs, ...).
#[async_trait]
pub trait ChainProvider: Send + Sync + std::fmt::Debug {
    fn provider_name(&self) -> String;

    async fn query_transaction(&self, txid: &str) -> Result<TransactionInfo, ChainError>;

    async fn broadcast(&self, txid: &str, hex: &str) -> Result<(), ChainError>;
}

/// Fans queries out over the configured providers.
#[derive(Clone)]
pub struct ChainService {
    providers: Vec<Arc<dyn ChainProvider>>,
    timeout: Duration,
}

impl ChainService {
    pub fn new(providers: Vec<Arc<dyn ChainProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Look up a transaction under the given policy.
    pub async fn query_transaction(
        &self,
        txid: &str,
        policy: QueryPolicy,
    ) -> Result<TransactionInfo, ChainError> {
        if self.providers.is_empty() {
            return Err(ChainError::NoProviders);
        }

        match policy {
            QueryPolicy::FastestAny => {
                let futures = self
                    .providers
                    .iter()
                    .map(|p| {
                        let provider = p.clone();
                        let txid = txid.to_string();
                        let timeout = self.timeout;
                        async move {
                            tokio::time::timeout(timeout, provider.query_transaction(&txid))
                                .await
                                .map_err(|_| ChainError::Timeout)?
                        }
                        .boxed()
                    })
                    .collect::<Vec<_>>();

                let (info, _remaining) = select_ok(futures).await?;
                debug!(txid, provider = %info.provider, "transaction found on chain");
                Ok(info)
            }
            QueryPolicy::AllProviders => {
                let futures = self.providers.iter().map(|p| {
                    let provider = p.clone();
                    let txid = txid.to_string();
                    let timeout = self.timeout;
                    async move {
                        tokio::time::timeout(timeout, provider.query_transaction(&txid))
                            .await
                            .map_err(|_| ChainError::Timeout)?
                    }
                });

                let results = join_all(futures).await;
                let mut best: Option<TransactionInfo> = None;
                for result in results {
                    let info = result?;
                    // Prefer the most confirmed answer
                    let better = match &best {
                        None => true,
                        Some(b) => info.block_hash.is_some() && b.block_hash.is_none(),
                    };
                    if better {
                        best = Some(info);
                    }
                }
                best.ok_or(ChainError::NoProviders)
            }
        }
    }

    /// Push raw transaction hex to every provider; success as soon as one
    /// accepts it.
    pub async fn broadcast(&self, txid: &str, hex: &str) -> Result<String, ChainError> {
        if self.providers.is_empty() {
            return Err(ChainError::NoProviders);
        }

        let futures = self.providers.iter().map(|p| {
            let provider = p.clone();
            let txid = txid.to_string();
            let hex = hex.to_string();
            async move {
                let name = provider.provider_name();
                provider.broadcast(&txid, &hex).await.map(|_| name)
            }
        });

        let mut last_err = ChainError::NoProviders;
        for result in join_all(futures).await {
            match result {
                Ok(provider) => {
                    debug!(txid, provider = %provider, "transaction broadcast");
                    return Ok(provider);
                }
                Err(err) => {
                    warn!(txid, error = %err, "provider rejected broadcast");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }
}
