use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bitcoincore_rpc::{Auth, Client, RpcApi};

use crate::infrastructure::chain::error::ChainError;
use crate::infrastructure::chain::{ChainProvider, TransactionInfo};

/// Chain provider backed by a Bitcoin Core compatible node over JSON-RPC.
/// The rpc client is blocking, so every call hops onto the blocking pool.
pub struct NodeProvider {
    client: Arc<Client>,
    name: String,
}

impl NodeProvider {
    pub fn new(
        url: &str,
        username: String,
        password: String,
    ) -> Result<Self, ChainError> {
        let auth = if username.is_empty() {
            Auth::None
        } else {
            Auth::UserPass(username, password)
        };
        let client =
            Client::new(url, auth).map_err(|e| ChainError::Connection(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
            name: format!("node ({})", url),
        })
    }
}

impl std::fmt::Debug for NodeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeProvider").field("name", &self.name).finish()
    }
}

#[async_trait]
impl ChainProvider for NodeProvider {
    fn provider_name(&self) -> String {
        self.name.clone()
    }

    async fn query_transaction(&self, txid: &str) -> Result<TransactionInfo, ChainError> {
        let client = self.client.clone();
        let name = self.name.clone();
        let txid_owned = txid.to_string();

        tokio::task::spawn_blocking(move || {
            let parsed = bitcoincore_rpc::bitcoin::Txid::from_str(&txid_owned)
                .map_err(|e| ChainError::Rpc(e.to_string()))?;
            let info = client
                .get_raw_transaction_info(&parsed, None)
                .map_err(|_| ChainError::TransactionNotFound(txid_owned.clone()))?;
            Ok(TransactionInfo {
                id: txid_owned,
                block_hash: info.blockhash.map(|h| h.to_string()),
                block_height: None,
                confirmations: info.confirmations.map(u64::from),
                provider: name,
            })
        })
        .await
        .map_err(|e| ChainError::Rpc(e.to_string()))?
    }

    async fn broadcast(&self, _txid: &str, hex: &str) -> Result<(), ChainError> {
        let client = self.client.clone();
        let hex = hex.to_string();

        tokio::task::spawn_blocking(move || {
            client
                .send_raw_transaction(hex.as_str())
                .map(|_| ())
                .map_err(|e| ChainError::Broadcast(e.to_string()))
        })
        .await
        .map_err(|e| ChainError::Rpc(e.to_string()))?
    }
}
