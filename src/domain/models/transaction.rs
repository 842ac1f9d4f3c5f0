use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::engine::Engine;
use crate::domain::errors::WalletError;
use crate::domain::models::{DraftStatus, ModelState, Utxo};
use crate::domain::services::recorder;
use crate::infrastructure::persistence::entities::transactions;
use crate::infrastructure::persistence::orchestrator::Persistable;
use crate::infrastructure::persistence::DbError;

/// A broadcast-ready transaction recorded against the ledger.
///
/// Recording validates the inputs against their reservations, marks them
/// spent and creates utxo rows for every output the engine can attribute
/// to a known destination, all in one atomic write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Canonical transaction id derived from the raw bytes
    pub id: String,
    pub hex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<String>,
    pub fee: u64,
    pub total_value: u64,
    pub number_of_inputs: u32,
    pub number_of_outputs: u32,
    /// Owners touched on the input side
    pub xpub_in_ids: Vec<String>,
    /// Owners touched on the output side
    pub xpub_out_ids: Vec<String>,
    /// Signed satoshi delta per owner, applied after commit
    pub xpub_output_value: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,

    /// Utxo rows staged by the recorder, persisted with this row
    #[serde(skip)]
    pub(crate) staged_utxos: Vec<Utxo>,
    /// Owner on whose behalf this transaction is being recorded
    #[serde(skip)]
    pub(crate) recording_xpub_id: Option<String>,
    #[serde(skip)]
    pub(crate) state: ModelState,
}

impl Transaction {
    /// Build a model from raw transaction hex. The id is computed from the
    /// bytes, never trusted from the caller.
    pub fn from_hex(hex_str: &str, draft_id: Option<String>) -> Result<Self, WalletError> {
        let parsed = parse_transaction(hex_str)?;
        Ok(Self {
            id: parsed.compute_txid().to_string(),
            hex: hex_str.to_string(),
            draft_id,
            fee: 0,
            total_value: 0,
            number_of_inputs: parsed.input.len() as u32,
            number_of_outputs: parsed.output.len() as u32,
            xpub_in_ids: Vec::new(),
            xpub_out_ids: Vec::new(),
            xpub_output_value: BTreeMap::new(),
            block_hash: None,
            block_height: None,
            created_at: Utc::now(),
            updated_at: None,
            staged_utxos: Vec::new(),
            recording_xpub_id: None,
            state: ModelState::new_record(),
        })
    }

    pub(crate) fn from_entity(m: transactions::Model) -> Self {
        Self {
            id: m.id,
            hex: m.hex,
            draft_id: m.draft_id,
            fee: m.fee.max(0) as u64,
            total_value: m.total_value.max(0) as u64,
            number_of_inputs: m.number_of_inputs.max(0) as u32,
            number_of_outputs: m.number_of_outputs.max(0) as u32,
            xpub_in_ids: serde_json::from_value(m.xpub_in_ids).unwrap_or_default(),
            xpub_out_ids: serde_json::from_value(m.xpub_out_ids).unwrap_or_default(),
            xpub_output_value: serde_json::from_value(m.xpub_output_value).unwrap_or_default(),
            block_hash: m.block_hash,
            block_height: m.block_height.map(|h| h.max(0) as u64),
            created_at: m.created_at,
            updated_at: m.updated_at,
            staged_utxos: Vec::new(),
            recording_xpub_id: None,
            state: ModelState::existing(),
        }
    }

    fn to_active_model(&self) -> Result<transactions::ActiveModel, DbError> {
        let to_json = |value: Result<serde_json::Value, serde_json::Error>| {
            value.map_err(|e| DbError::QueryError(e.to_string()))
        };
        Ok(transactions::ActiveModel {
            id: Set(self.id.clone()),
            hex: Set(self.hex.clone()),
            draft_id: Set(self.draft_id.clone()),
            fee: Set(self.fee as i64),
            total_value: Set(self.total_value as i64),
            number_of_inputs: Set(self.number_of_inputs as i32),
            number_of_outputs: Set(self.number_of_outputs as i32),
            xpub_in_ids: Set(to_json(serde_json::to_value(&self.xpub_in_ids))?),
            xpub_out_ids: Set(to_json(serde_json::to_value(&self.xpub_out_ids))?),
            xpub_output_value: Set(to_json(serde_json::to_value(&self.xpub_output_value))?),
            block_hash: Set(self.block_hash.clone()),
            block_height: Set(self.block_height.map(|h| h as i64)),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
        })
    }
}

/// Decode raw transaction hex with consensus rules.
pub fn parse_transaction(hex_str: &str) -> Result<bitcoin::Transaction, WalletError> {
    let bytes = hex::decode(hex_str).map_err(|e| WalletError::InvalidHex(e.to_string()))?;
    bitcoin::consensus::deserialize(&bytes).map_err(|e| WalletError::InvalidHex(e.to_string()))
}

#[async_trait]
impl Persistable for Transaction {
    fn model_name(&self) -> &'static str {
        "transaction"
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
        engine: &Engine,
        txn: &DatabaseTransaction,
    ) -> Result<(), WalletError> {
        recorder::process_transaction(engine, txn, self).await
    }

    fn take_children(&mut self) -> Vec<Box<dyn Persistable>> {
        std::mem::take(&mut self.staged_utxos)
            .into_iter()
            .map(|u| Box::new(u) as Box<dyn Persistable>)
            .collect()
    }

    /// Balance deltas are applied once the row is committed; a crash
    /// between commit and here loses only the increments, never the
    /// double-spend protection.
    async fn after_created(&mut self, engine: &Engine) -> Result<(), WalletError> {
        for (xpub_id, delta) in &self.xpub_output_value {
            engine
                .repositories()
                .xpub
                .increment_balance(engine.pool().connection(), xpub_id, *delta)
                .await?;
        }

        // Completing the draft is best effort; the recorded transaction is
        // already the source of truth.
        if let Some(draft_id) = self.draft_id.clone() {
            if let Err(err) = complete_draft(engine, &draft_id, &self.id).await {
                warn!(draft_id = %draft_id, error = %err, "failed to complete draft");
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

async fn complete_draft(
    engine: &Engine,
    draft_id: &str,
    tx_id: &str,
) -> Result<(), WalletError> {
    let model = engine
        .repositories()
        .draft_transaction
        .get_by_id(engine.pool().connection(), draft_id)
        .await?;
    let mut draft = match model {
        Some(m) => super::DraftTransaction::from_entity(m),
        None => return Ok(()),
    };
    if draft.status == DraftStatus::Complete {
        return Ok(());
    }
    draft.status = DraftStatus::Complete;
    draft.final_tx_id = Some(tx_id.to_string());
    crate::infrastructure::persistence::save(engine, &mut draft).await
}

#[cfg(test)]
mod tests {
    use super::*;

    // Coinbase of mainnet block 2: one input, one output
    const BLOCK_2_COINBASE: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff0704ffff001d010bffffffff0100f2052a010000004341047211a824f55b505228e4c3d5194c1fcfaa15a456abdf37f9b9d97a4040afc073dee6c89064984f03385237d92167c13e236446b417ab79a0fcae412ae3316b77ac00000000";

    #[test]
    fn from_hex_computes_canonical_id() {
        let tx = Transaction::from_hex(BLOCK_2_COINBASE, None).unwrap();
        assert_eq!(
            tx.id,
            "9b0fc92260312ce44e74ef369f5c66bbb85848f2eddd5a7a1cde251e54ccfdd5"
        );
        assert_eq!(tx.number_of_inputs, 1);
        assert_eq!(tx.number_of_outputs, 1);
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(matches!(
            Transaction::from_hex("zz", None),
            Err(WalletError::InvalidHex(_))
        ));
        assert!(matches!(
            Transaction::from_hex("0102", None),
            Err(WalletError::InvalidHex(_))
        ));
    }
}
