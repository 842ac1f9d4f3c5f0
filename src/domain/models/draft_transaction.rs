use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::engine::Engine;
use crate::domain::errors::WalletError;
use crate::domain::models::{Destination, ModelState, TransactionConfig};
use crate::domain::services::draft_builder;
use crate::infrastructure::persistence::entities::draft_transactions;
use crate::infrastructure::persistence::orchestrator::Persistable;
use crate::infrastructure::persistence::DbError;
use crate::utils;

/// Lifecycle states of a draft transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    #[default]
    Draft,
    Canceled,
    Expired,
    Complete,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Draft => "draft",
            DraftStatus::Canceled => "canceled",
            DraftStatus::Expired => "expired",
            DraftStatus::Complete => "complete",
        }
    }

    /// A terminal draft never goes back to pending.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DraftStatus::Draft)
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DraftStatus {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(DraftStatus::Draft),
            "canceled" => Ok(DraftStatus::Canceled),
            "expired" => Ok(DraftStatus::Expired),
            "complete" => Ok(DraftStatus::Complete),
            _ => Err(WalletError::MissingField("status")),
        }
    }
}

/// A prepared but unsigned transaction. Building one reserves the inputs
/// it spends; completing, canceling or expiring it settles or releases
/// those reservations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftTransaction {
    pub id: String,
    pub xpub_id: String,
    pub status: DraftStatus,
    pub configuration: TransactionConfig,
    pub expires_at: DateTime<Utc>,
    /// Unsigned transaction hex, filled by the builder
    pub hex: String,
    /// Id of the recorded transaction that completed this draft
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,

    /// Raw key of the owner, needed to derive change destinations; only
    /// present when the draft was created in this process
    #[serde(skip)]
    pub(crate) raw_xpub_key: Option<String>,
    /// Change destinations staged by the builder, persisted with the draft
    #[serde(skip)]
    pub(crate) staged_destinations: Vec<Destination>,
    #[serde(skip)]
    pub(crate) state: ModelState,
}

impl DraftTransaction {
    pub fn new(raw_xpub_key: &str, configuration: TransactionConfig) -> Self {
        Self {
            id: utils::random_hex_32(),
            xpub_id: utils::hash(raw_xpub_key),
            status: DraftStatus::Draft,
            configuration,
            expires_at: Utc::now(),
            hex: String::new(),
            final_tx_id: None,
            created_at: Utc::now(),
            updated_at: None,
            raw_xpub_key: Some(raw_xpub_key.to_string()),
            staged_destinations: Vec::new(),
            state: ModelState::new_record(),
        }
    }

    pub(crate) fn from_entity(m: draft_transactions::Model) -> Self {
        let configuration: TransactionConfig =
            serde_json::from_value(m.configuration).unwrap_or_default();
        Self {
            id: m.id,
            xpub_id: m.xpub_id,
            status: m.status.parse().unwrap_or(DraftStatus::Draft),
            configuration,
            expires_at: m.expires_at,
            hex: m.hex,
            final_tx_id: m.final_tx_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
            raw_xpub_key: None,
            staged_destinations: Vec::new(),
            state: ModelState::existing(),
        }
    }

    fn to_active_model(&self) -> Result<draft_transactions::ActiveModel, DbError> {
        let configuration = serde_json::to_value(&self.configuration)
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(draft_transactions::ActiveModel {
            id: Set(self.id.clone()),
            xpub_id: Set(self.xpub_id.clone()),
            status: Set(self.status.to_string()),
            configuration: Set(configuration),
            expires_at: Set(self.expires_at),
            hex: Set(self.hex.clone()),
            final_tx_id: Set(self.final_tx_id.clone()),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
        })
    }
}

#[async_trait]
impl Persistable for DraftTransaction {
    fn model_name(&self) -> &'static str {
        "draft_transaction"
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

    /// Building the draft happens here so a failed build never leaves a
    /// draft row behind. A failed build rolls the transaction back,
    /// reservations included.
    async fn before_creating(
        &mut self,
        engine: &Engine,
        txn: &DatabaseTransaction,
    ) -> Result<(), WalletError> {
        if self.xpub_id.is_empty() {
            return Err(WalletError::MissingField("xpub_id"));
        }
        draft_builder::build_draft(engine, txn, self).await
    }

    fn take_children(&mut self) -> Vec<Box<dyn Persistable>> {
        std::mem::take(&mut self.staged_destinations)
            .into_iter()
            .map(|d| Box::new(d) as Box<dyn Persistable>)
            .collect()
    }

    /// Reservations are only useful while the draft is pending; release
    /// them as soon as it reaches a non-complete terminal state. A
    /// completed draft keeps its inputs, the recorder marks them spent.
    async fn after_updated(&mut self, engine: &Engine) -> Result<(), WalletError> {
        if matches!(self.status, DraftStatus::Canceled | DraftStatus::Expired) {
            let released = engine
                .repositories()
                .utxo
                .unreserve_utxos(engine.pool().connection(), &self.id, &self.xpub_id)
                .await?;
            if released > 0 {
                warn!(
                    draft_id = %self.id,
                    released,
                    status = %self.status,
                    "released reservations of terminal draft"
                );
            }
        }
        Ok(())
    }

    async fn persist(&self, txn: &DatabaseTransaction) -> Result<(), DbError> {
        let model = self.to_active_model()?;
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

    #[test]
    fn status_round_trip() {
        for status in [
            DraftStatus::Draft,
            DraftStatus::Canceled,
            DraftStatus::Expired,
            DraftStatus::Complete,
        ] {
            assert_eq!(status.as_str().parse::<DraftStatus>().unwrap(), status);
        }
        assert!(!DraftStatus::Draft.is_terminal());
        assert!(DraftStatus::Complete.is_terminal());
    }

    #[test]
    fn new_draft_gets_random_id() {
        let a = DraftTransaction::new("xpub-id", TransactionConfig::default());
        let b = DraftTransaction::new("xpub-id", TransactionConfig::default());
        assert_eq!(a.id.len(), 64);
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, DraftStatus::Draft);
    }
}
