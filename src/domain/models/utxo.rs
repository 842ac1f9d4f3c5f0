use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};

use crate::application::engine::Engine;
use crate::domain::errors::WalletError;
use crate::domain::models::ModelState;
use crate::infrastructure::persistence::entities::utxos;
use crate::infrastructure::persistence::orchestrator::Persistable;
use crate::infrastructure::persistence::DbError;
use crate::utils;
use crate::utils::scripts::ScriptType;

/// An unspent transaction output tracked by the engine.
///
/// Lifecycle: free (`draft_id` and `spending_tx_id` unset), reserved
/// (`draft_id` and `reserved_at` set) and spent (`spending_tx_id` set,
/// terminal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utxo {
    pub id: String,
    pub transaction_id: String,
    pub output_index: u32,
    pub xpub_id: String,
    pub satoshis: u64,
    pub script_pub_key: String,
    pub script_type: ScriptType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spending_tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub(crate) state: ModelState,
}

impl Utxo {
    pub fn new(
        transaction_id: &str,
        output_index: u32,
        xpub_id: &str,
        satoshis: u64,
        script_pub_key: &str,
    ) -> Self {
        Self {
            id: utils::utxo_id(transaction_id, output_index),
            transaction_id: transaction_id.to_string(),
            output_index,
            xpub_id: xpub_id.to_string(),
            satoshis,
            script_pub_key: script_pub_key.to_string(),
            script_type: utils::scripts::script_type(script_pub_key),
            draft_id: None,
            reserved_at: None,
            spending_tx_id: None,
            created_at: Utc::now(),
            updated_at: None,
            state: ModelState::new_record(),
        }
    }

    pub(crate) fn from_entity(m: utxos::Model) -> Self {
        Self {
            id: m.id,
            transaction_id: m.transaction_id,
            output_index: m.output_index.max(0) as u32,
            xpub_id: m.xpub_id,
            satoshis: m.satoshis.max(0) as u64,
            script_type: m.script_type.parse().unwrap_or(ScriptType::NonStandard),
            script_pub_key: m.script_pub_key,
            draft_id: m.draft_id,
            reserved_at: m.reserved_at,
            spending_tx_id: m.spending_tx_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
            state: ModelState::existing(),
        }
    }

    fn to_active_model(&self) -> utxos::ActiveModel {
        utxos::ActiveModel {
            id: Set(self.id.clone()),
            transaction_id: Set(self.transaction_id.clone()),
            output_index: Set(self.output_index as i32),
            xpub_id: Set(self.xpub_id.clone()),
            satoshis: Set(self.satoshis as i64),
            script_pub_key: Set(self.script_pub_key.clone()),
            script_type: Set(self.script_type.to_string()),
            draft_id: Set(self.draft_id.clone()),
            reserved_at: Set(self.reserved_at),
            spending_tx_id: Set(self.spending_tx_id.clone()),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
        }
    }

    pub fn is_reserved(&self) -> bool {
        self.draft_id.is_some() && self.spending_tx_id.is_none()
    }

    pub fn is_spent(&self) -> bool {
        self.spending_tx_id.is_some()
    }
}

#[async_trait]
impl Persistable for Utxo {
    fn model_name(&self) -> &'static str {
        "utxo"
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
        if self.transaction_id.is_empty() {
            return Err(WalletError::MissingField("transaction_id"));
        }
        if self.xpub_id.is_empty() {
            return Err(WalletError::MissingField("xpub_id"));
        }
        if self.script_pub_key.is_empty() {
            return Err(WalletError::MissingField("script_pub_key"));
        }
        if self.satoshis == 0 {
            return Err(WalletError::MissingField("satoshis"));
        }
        if self.id != utils::utxo_id(&self.transaction_id, self.output_index) {
            return Err(WalletError::MissingField("id"));
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    const P2PKH_SCRIPT: &str = "76a9147ff514e6ae3deb46e6644caac5cdd0bf2388906588ac";

    #[test]
    fn new_derives_outpoint_id() {
        let utxo = Utxo::new("abcd", 3, "xpub-id", 1225, P2PKH_SCRIPT);
        assert_eq!(utxo.id, utils::utxo_id("abcd", 3));
        assert_eq!(utxo.script_type, ScriptType::PubKeyHash);
        assert!(!utxo.is_reserved());
        assert!(!utxo.is_spent());
    }
}
