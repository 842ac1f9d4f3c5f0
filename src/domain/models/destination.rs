use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};

use crate::application::engine::Engine;
use crate::domain::errors::WalletError;
use crate::domain::models::ModelState;
use crate::infrastructure::persistence::entities::destinations;
use crate::infrastructure::persistence::orchestrator::Persistable;
use crate::infrastructure::persistence::DbError;
use crate::utils;
use crate::utils::scripts::ScriptType;

/// A derived output script owned by an xpub, identified by the hash of its
/// locking script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub xpub_id: String,
    pub locking_script: String,
    pub script_type: ScriptType,
    /// Derivation branch: 0 external, 1 internal
    pub chain: u32,
    /// Index on that branch
    pub num: u32,
    pub address: String,
    /// Set when the destination was created as draft change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    #[serde(skip)]
    pub(crate) state: ModelState,
}

impl Destination {
    pub fn new(
        xpub_id: &str,
        locking_script: &str,
        chain: u32,
        num: u32,
        address: &str,
    ) -> Self {
        Self {
            id: utils::hash(locking_script),
            xpub_id: xpub_id.to_string(),
            locking_script: locking_script.to_string(),
            script_type: utils::scripts::script_type(locking_script),
            chain,
            num,
            address: address.to_string(),
            draft_id: None,
            created_at: Utc::now(),
            updated_at: None,
            metadata: None,
            state: ModelState::new_record(),
        }
    }

    pub(crate) fn from_entity(m: destinations::Model) -> Self {
        Self {
            id: m.id,
            xpub_id: m.xpub_id,
            script_type: m
                .script_type
                .parse()
                .unwrap_or(ScriptType::NonStandard),
            locking_script: m.locking_script,
            chain: m.chain.max(0) as u32,
            num: m.num.max(0) as u32,
            address: m.address,
            draft_id: m.draft_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
            metadata: m.metadata,
            state: ModelState::existing(),
        }
    }

    fn to_active_model(&self) -> destinations::ActiveModel {
        destinations::ActiveModel {
            id: Set(self.id.clone()),
            xpub_id: Set(self.xpub_id.clone()),
            locking_script: Set(self.locking_script.clone()),
            script_type: Set(self.script_type.to_string()),
            chain: Set(self.chain as i32),
            num: Set(self.num as i32),
            address: Set(self.address.clone()),
            draft_id: Set(self.draft_id.clone()),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
            metadata: Set(self.metadata.clone()),
        }
    }

    fn cache_key(&self) -> String {
        format!("destination-id-{}", self.id)
    }
}

#[async_trait]
impl Persistable for Destination {
    fn model_name(&self) -> &'static str {
        "destination"
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
        if self.locking_script.is_empty() {
            return Err(WalletError::MissingField("locking_script"));
        }
        if self.xpub_id.is_empty() {
            return Err(WalletError::MissingField("xpub_id"));
        }
        if self.id != utils::hash(&self.locking_script) {
            return Err(WalletError::InvalidLockingScript(
                "id does not match locking script".to_string(),
            ));
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
