use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};

use crate::application::engine::Engine;
use crate::domain::errors::WalletError;
use crate::domain::models::ModelState;
use crate::infrastructure::persistence::entities::xpubs;
use crate::infrastructure::persistence::orchestrator::Persistable;
use crate::infrastructure::persistence::DbError;
use crate::utils;

/// An owner account, identified by the hash of its extended public key.
///
/// The balance is only ever mutated through atomic increments
/// ([`crate::infrastructure::persistence::repositories::XpubRepository::increment_balance`]);
/// drafts never debit it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Xpub {
    pub id: String,
    pub current_balance: u64,
    pub next_internal_num: u32,
    pub next_external_num: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,

    /// Raw key, only populated when the model was built from one
    #[serde(skip)]
    pub(crate) raw_xpub_key: Option<String>,
    #[serde(skip)]
    pub(crate) state: ModelState,
}

impl Xpub {
    /// Start a new xpub model from a raw extended public key.
    pub fn new(raw_xpub_key: &str) -> Self {
        Self {
            id: utils::hash(raw_xpub_key),
            current_balance: 0,
            next_internal_num: 0,
            next_external_num: 0,
            created_at: Utc::now(),
            updated_at: None,
            metadata: None,
            raw_xpub_key: Some(raw_xpub_key.to_string()),
            state: ModelState::new_record(),
        }
    }

    pub(crate) fn from_entity(m: xpubs::Model) -> Self {
        Self {
            id: m.id,
            current_balance: m.current_balance.max(0) as u64,
            next_internal_num: m.next_internal_num.max(0) as u32,
            next_external_num: m.next_external_num.max(0) as u32,
            created_at: m.created_at,
            updated_at: m.updated_at,
            metadata: m.metadata,
            raw_xpub_key: None,
            state: ModelState::existing(),
        }
    }

    fn to_active_model(&self) -> xpubs::ActiveModel {
        xpubs::ActiveModel {
            id: Set(self.id.clone()),
            current_balance: Set(self.current_balance as i64),
            next_internal_num: Set(self.next_internal_num as i64),
            next_external_num: Set(self.next_external_num as i64),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
            metadata: Set(self.metadata.clone()),
        }
    }

    fn cache_key(&self) -> String {
        format!("xpub-id-{}", self.id)
    }
}

#[async_trait]
impl Persistable for Xpub {
    fn model_name(&self) -> &'static str {
        "xpub"
    }

    fn record_id(&self) -> String {
        self.id.clone()
    }

    fn is_new(&self) -> bool {
        self.state.is_new()
    }

    fn mark_not_new(&mut self) {
        self.state.mark_not_new();
    }

    fn stamp(&mut self, created: bool, at: DateTime<Utc>) {
        if created {
            self.created_at = at;
        } else {
            self.updated_at = Some(at);
        }
    }

    async fn before_creating(
        &mut self,
        _engine: &Engine,
        _txn: &DatabaseTransaction,
    ) -> Result<(), WalletError> {
        if let Some(raw_key) = &self.raw_xpub_key {
            utils::keys::validate_xpub(raw_key)?;
        }
        if self.id.is_empty() {
            return Err(WalletError::MissingField("id"));
        }
        Ok(())
    }

    async fn after_created(&mut self, engine: &Engine) -> Result<(), WalletError> {
        engine.cache_model(&self.cache_key(), self).await;
        Ok(())
    }

    async fn after_updated(&mut self, engine: &Engine) -> Result<(), WalletError> {
        engine.cache_model(&self.cache_key(), self).await;
        Ok(())
    }

    async fn persist(&self, txn: &DatabaseTransaction) -> Result<(), DbError> {
        let model = self.to_active_model();
        if self.is_new() {
            model.insert(txn).await?;
        } else {
            model.update(txn).await?;
        }
        Ok(())
    }
}
