use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::domain::errors::WalletError;
use crate::domain::models::{
    AccessKey, Destination, DraftStatus, DraftTransaction, Transaction, TransactionConfig, Utxo,
    UtxoPointer, Xpub,
};
use crate::infrastructure::cache::{CacheStore, InMemoryCache};
use crate::infrastructure::chain::{ChainProvider, ChainService, QueryPolicy, TransactionInfo};
use crate::infrastructure::paymail::PaymailResolver;
use crate::infrastructure::persistence::{self, DbPool, Repositories};
use crate::infrastructure::tasks;
use crate::utils;
use crate::utils::scripts::ScriptType;

struct Inner {
    config: EngineConfig,
    pool: DbPool,
    repositories: Repositories,
    cache: Arc<dyn CacheStore>,
    paymail: Option<Arc<dyn PaymailResolver>>,
    chain: Option<ChainService>,
}

/// The wallet engine: the single entry point for accounts, destinations,
/// utxo reservation, draft building and transaction recording. Cheap to
/// clone; all clones share the same pool and collaborators.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn pool(&self) -> &DbPool {
        &self.inner.pool
    }

    pub fn repositories(&self) -> &Repositories {
        &self.inner.repositories
    }

    pub fn paymail_resolver(&self) -> Option<Arc<dyn PaymailResolver>> {
        self.inner.paymail.clone()
    }

    pub fn chain(&self) -> Option<&ChainService> {
        self.inner.chain.as_ref()
    }

    /// Best-effort cache write; the database remains the source of truth.
    pub(crate) async fn cache_model<T: Serialize>(&self, key: &str, model: &T) {
        match serde_json::to_string(model) {
            Ok(json) => self.inner.cache.set(key, json).await,
            Err(err) => warn!(key, error = %err, "failed to serialize model for cache"),
        }
    }

    // ----- xpubs -----

    /// Register a new account from its raw extended public key.
    pub async fn new_xpub(
        &self,
        raw_xpub_key: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Xpub, WalletError> {
        let mut xpub = Xpub::new(raw_xpub_key);
        xpub.metadata = metadata;
        persistence::save(self, &mut xpub).await?;
        info!(xpub_id = %xpub.id, "new xpub registered");
        Ok(xpub)
    }

    pub async fn get_xpub(&self, raw_xpub_key: &str) -> Result<Xpub, WalletError> {
        self.get_xpub_by_id(&utils::hash(raw_xpub_key)).await
    }

    pub async fn get_xpub_by_id(&self, xpub_id: &str) -> Result<Xpub, WalletError> {
        if let Some(json) = self.inner.cache.get(&format!("xpub-id-{}", xpub_id)).await {
            if let Ok(xpub) = serde_json::from_str::<Xpub>(&json) {
                debug!(xpub_id, "xpub served from cache");
                return Ok(xpub);
            }
        }
        let model = self
            .inner
            .repositories
            .xpub
            .get_by_id(self.pool().connection(), xpub_id)
            .await?
            .ok_or(WalletError::MissingXpub)?;
        Ok(Xpub::from_entity(model))
    }

    pub async fn update_xpub_metadata(
        &self,
        raw_xpub_key: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Xpub, WalletError> {
        let mut xpub = self.get_xpub(raw_xpub_key).await?;
        xpub.metadata = metadata.clone();
        self.inner
            .repositories
            .xpub
            .update_metadata(self.pool().connection(), &xpub.id, metadata)
            .await?;
        self.cache_model(&format!("xpub-id-{}", xpub.id), &xpub).await;
        Ok(xpub)
    }

    // ----- destinations -----

    /// Derive the next receiving destination for an account.
    pub async fn new_destination(
        &self,
        raw_xpub_key: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Destination, WalletError> {
        let hd_key = utils::keys::validate_xpub(raw_xpub_key)?;
        let xpub = self.get_xpub(raw_xpub_key).await?;

        let num = self
            .inner
            .repositories
            .xpub
            .increment_next_num(
                self.pool().connection(),
                &xpub.id,
                crate::infrastructure::persistence::repositories::DerivationBranch::External,
            )
            .await?;
        let (address, script) = utils::keys::derive_address(
            &hd_key,
            utils::keys::CHAIN_EXTERNAL,
            num,
            self.inner.config.network,
        )?;

        let mut destination =
            Destination::new(&xpub.id, &script, utils::keys::CHAIN_EXTERNAL, num, &address);
        destination.metadata = metadata;
        persistence::save(self, &mut destination).await?;
        Ok(destination)
    }

    pub async fn get_destination_by_address(
        &self,
        address: &str,
    ) -> Result<Destination, WalletError> {
        let model = self
            .inner
            .repositories
            .destination
            .get_by_address(self.pool().connection(), address)
            .await?
            .ok_or(WalletError::MissingDestination)?;
        Ok(Destination::from_entity(model))
    }

    pub async fn get_destination_by_locking_script(
        &self,
        locking_script: &str,
    ) -> Result<Destination, WalletError> {
        let model = self
            .inner
            .repositories
            .destination
            .get_by_locking_script(self.pool().connection(), locking_script)
            .await?
            .ok_or(WalletError::MissingDestination)?;
        Ok(Destination::from_entity(model))
    }

    // ----- utxos -----

    pub async fn get_utxo(
        &self,
        transaction_id: &str,
        output_index: u32,
    ) -> Result<Option<Utxo>, WalletError> {
        let model = self
            .inner
            .repositories
            .utxo
            .get_by_outpoint(self.pool().connection(), transaction_id, output_index)
            .await?;
        Ok(model.map(Utxo::from_entity))
    }

    /// Spendable outputs of an account with the given script type, minus
    /// the excluded outpoints.
    pub async fn get_spendable_utxos(
        &self,
        raw_xpub_key: &str,
        script_type: ScriptType,
        exclude: &[UtxoPointer],
    ) -> Result<Vec<Utxo>, WalletError> {
        let xpub_id = utils::hash(raw_xpub_key);
        let models = self
            .inner
            .repositories
            .utxo
            .get_spendable(self.pool().connection(), &xpub_id, script_type, exclude)
            .await?;
        Ok(models.into_iter().map(Utxo::from_entity).collect())
    }

    /// Reserve spendable outputs for an externally managed draft.
    pub async fn reserve_utxos(
        &self,
        raw_xpub_key: &str,
        draft_id: &str,
        satoshis: u64,
        fee_per_byte: f64,
        from_utxos: Option<&[UtxoPointer]>,
    ) -> Result<Vec<Utxo>, WalletError> {
        let xpub_id = utils::hash(raw_xpub_key);
        let models = self
            .inner
            .repositories
            .utxo
            .reserve_utxos(
                self.pool().connection(),
                draft_id,
                &xpub_id,
                satoshis,
                fee_per_byte,
                from_utxos,
            )
            .await?;
        Ok(models.into_iter().map(Utxo::from_entity).collect())
    }

    /// Release every reservation a draft holds. Idempotent.
    pub async fn unreserve_utxos(
        &self,
        raw_xpub_key: &str,
        draft_id: &str,
    ) -> Result<(), WalletError> {
        let xpub_id = utils::hash(raw_xpub_key);
        self.inner
            .repositories
            .utxo
            .unreserve_utxos(self.pool().connection(), draft_id, &xpub_id)
            .await?;
        Ok(())
    }

    // ----- draft transactions -----

    /// Build and persist a new draft. The builder reserves inputs on the
    /// save transaction, so a failed build rolls its reservations back
    /// with everything else.
    pub async fn new_draft_transaction(
        &self,
        raw_xpub_key: &str,
        configuration: TransactionConfig,
    ) -> Result<DraftTransaction, WalletError> {
        // The owner must exist before we reserve anything in its name
        self.get_xpub(raw_xpub_key).await?;

        let mut draft = DraftTransaction::new(raw_xpub_key, configuration);
        persistence::save(self, &mut draft).await?;
        Ok(draft)
    }

    pub async fn get_draft_transaction(
        &self,
        raw_xpub_key: &str,
        draft_id: &str,
    ) -> Result<DraftTransaction, WalletError> {
        let xpub_id = utils::hash(raw_xpub_key);
        let model = self
            .inner
            .repositories
            .draft_transaction
            .get(self.pool().connection(), &xpub_id, draft_id)
            .await?
            .ok_or(WalletError::DraftNotFound)?;
        Ok(DraftTransaction::from_entity(model))
    }

    /// Cancel a pending draft, releasing its reservations.
    pub async fn cancel_draft_transaction(
        &self,
        raw_xpub_key: &str,
        draft_id: &str,
    ) -> Result<DraftTransaction, WalletError> {
        let mut draft = self.get_draft_transaction(raw_xpub_key, draft_id).await?;
        if draft.status.is_terminal() {
            return Ok(draft);
        }
        draft.status = DraftStatus::Canceled;
        persistence::save(self, &mut draft).await?;
        Ok(draft)
    }

    // ----- transactions -----

    /// Record a transaction, settling the reservations it spends.
    pub async fn record_transaction(
        &self,
        raw_xpub_key: &str,
        tx_hex: &str,
        draft_id: Option<String>,
    ) -> Result<Transaction, WalletError> {
        let mut tx = Transaction::from_hex(tx_hex, draft_id)?;
        tx.recording_xpub_id = Some(utils::hash(raw_xpub_key));
        persistence::save(self, &mut tx).await?;
        info!(txid = %tx.id, "transaction recorded");
        Ok(tx)
    }

    pub async fn get_transaction(&self, txid: &str) -> Result<Option<Transaction>, WalletError> {
        let model = self
            .inner
            .repositories
            .transaction
            .get_by_id(self.pool().connection(), txid)
            .await?;
        Ok(model.map(Transaction::from_entity))
    }

    /// Push a recorded transaction to the configured chain providers.
    pub async fn broadcast_transaction(&self, tx: &Transaction) -> Result<String, WalletError> {
        let chain = self.chain().ok_or(crate::infrastructure::chain::ChainError::NoProviders)?;
        Ok(chain.broadcast(&tx.id, &tx.hex).await?)
    }

    pub async fn query_transaction_info(
        &self,
        txid: &str,
        policy: QueryPolicy,
    ) -> Result<TransactionInfo, WalletError> {
        let chain = self.chain().ok_or(crate::infrastructure::chain::ChainError::NoProviders)?;
        Ok(chain.query_transaction(txid, policy).await?)
    }

    // ----- access keys -----

    /// Create a new access key for the account; the private key is only
    /// present on the returned model.
    pub async fn new_access_key(&self, raw_xpub_key: &str) -> Result<AccessKey, WalletError> {
        let xpub = self.get_xpub(raw_xpub_key).await?;
        let mut access_key = AccessKey::new(&xpub.id);
        persistence::save(self, &mut access_key).await?;
        Ok(access_key)
    }

    pub async fn get_access_key(&self, id: &str) -> Result<AccessKey, WalletError> {
        let model = self
            .inner
            .repositories
            .access_key
            .get_by_id(self.pool().connection(), id)
            .await?
            .ok_or(WalletError::UnknownAccessKey)?;
        Ok(AccessKey::from_entity(model))
    }

    pub async fn revoke_access_key(
        &self,
        raw_xpub_key: &str,
        id: &str,
    ) -> Result<AccessKey, WalletError> {
        let mut access_key = self.get_access_key(id).await?;
        if access_key.xpub_id != utils::hash(raw_xpub_key) {
            return Err(WalletError::XpubIdMismatch);
        }
        access_key.revoke();
        persistence::save(self, &mut access_key).await?;
        Ok(access_key)
    }

    // ----- background tasks -----

    /// Expire one batch of stale drafts now.
    pub async fn cleanup_draft_transactions(&self) -> Result<usize, WalletError> {
        tasks::cleanup_draft_transactions(self).await
    }

    /// Spawn the recurring draft expiry sweep.
    pub fn start_draft_cleanup(&self, interval: Duration) -> JoinHandle<()> {
        tasks::spawn_draft_cleanup(self.clone(), interval)
    }
}

/// Builds an [`Engine`] from its collaborators.
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    database_url: Option<String>,
    pool: Option<DbPool>,
    cache: Option<Arc<dyn CacheStore>>,
    paymail: Option<Arc<dyn PaymailResolver>>,
    chain_providers: Vec<Arc<dyn ChainProvider>>,
    chain_timeout: Option<Duration>,
    create_tables: bool,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn pool(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn paymail_resolver(mut self, resolver: Arc<dyn PaymailResolver>) -> Self {
        self.paymail = Some(resolver);
        self
    }

    pub fn chain_provider(mut self, provider: Arc<dyn ChainProvider>) -> Self {
        self.chain_providers.push(provider);
        self
    }

    pub fn chain_timeout(mut self, timeout: Duration) -> Self {
        self.chain_timeout = Some(timeout);
        self
    }

    /// Create the schema on connect; meant for ephemeral databases.
    pub fn create_tables(mut self) -> Self {
        self.create_tables = true;
        self
    }

    pub async fn build(self) -> Result<Engine, WalletError> {
        let config = self.config.unwrap_or_else(EngineConfig::from_env);

        let pool = match (self.pool, self.database_url) {
            (Some(pool), _) => pool,
            (None, Some(url)) => DbPool::connect(&url).await?,
            (None, None) => return Err(WalletError::MissingField("database_url")),
        };

        if self.create_tables {
            crate::infrastructure::persistence::schema::create_all_tables(pool.connection())
                .await?;
        }

        let repositories = Repositories::new(config.utxo_page_size);
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(InMemoryCache::new()));
        let chain = if self.chain_providers.is_empty() {
            None
        } else {
            Some(ChainService::new(
                self.chain_providers,
                self.chain_timeout.unwrap_or(Duration::from_secs(20)),
            ))
        };

        info!(network = %config.network, "wallet engine ready");
        Ok(Engine {
            inner: Arc::new(Inner {
                config,
                pool,
                repositories,
                cache,
                paymail: self.paymail,
                chain,
            }),
        })
    }
}
