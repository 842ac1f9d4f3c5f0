use std::collections::BTreeMap;

use sea_orm::DatabaseTransaction;
use tracing::debug;

use crate::application::engine::Engine;
use crate::domain::errors::WalletError;
use crate::domain::models::transaction::{parse_transaction, Transaction};
use crate::domain::models::{DraftStatus, DraftTransaction, Utxo};
use crate::utils;

/// Validate and annotate a transaction that is about to be recorded.
///
/// Inputs spending tracked outputs must hold a matching reservation;
/// outputs paying tracked destinations become new utxo rows. Both sides
/// are staged on the model so the save pipeline writes them atomically
/// with the transaction row. Balance deltas are accumulated per owner and
/// applied after commit.
pub async fn process_transaction(
    engine: &Engine,
    txn: &DatabaseTransaction,
    tx: &mut Transaction,
) -> Result<(), WalletError> {
    let parsed = parse_transaction(&tx.hex)?;

    if engine
        .repositories()
        .transaction
        .get_by_id(txn, &tx.id)
        .await?
        .is_some()
    {
        return Err(WalletError::TransactionAlreadyRecorded);
    }

    let draft = load_draft(engine, txn, tx).await?;

    let mut deltas: BTreeMap<String, i64> = BTreeMap::new();
    let mut in_ids: Vec<String> = Vec::new();
    let mut out_ids: Vec<String> = Vec::new();
    let mut staged: Vec<Utxo> = Vec::new();
    let mut known_inputs: u64 = 0;

    for input in &parsed.input {
        let prev_txid = input.previous_output.txid.to_string();
        let utxo_id = utils::utxo_id(&prev_txid, input.previous_output.vout);
        let model = match engine.repositories().utxo.get(txn, &utxo_id).await? {
            Some(m) => m,
            // Inputs the engine never tracked belong to someone else
            None => continue,
        };

        // The double-spend guard holds even when reservation checking is
        // switched off
        if model.spending_tx_id.is_some() {
            return Err(WalletError::UtxoAlreadySpent);
        }
        if engine.config().input_utxo_checking {
            match (&model.draft_id, &tx.draft_id) {
                (None, _) => return Err(WalletError::UtxoNotReserved),
                (Some(reserved_for), Some(draft_id)) if reserved_for == draft_id => {}
                (Some(_), _) => return Err(WalletError::DraftIdMismatch),
            }
        }

        known_inputs += model.satoshis.max(0) as u64;
        if !in_ids.contains(&model.xpub_id) {
            in_ids.push(model.xpub_id.clone());
        }
        *deltas.entry(model.xpub_id.clone()).or_insert(0) -= model.satoshis.max(0);

        let mut spent = Utxo::from_entity(model);
        spent.spending_tx_id = Some(tx.id.clone());
        staged.push(spent);
    }

    let mut total_out: u64 = 0;
    for (vout, output) in parsed.output.iter().enumerate() {
        let value = output.value.to_sat();
        total_out += value;
        let script_hex = hex::encode(output.script_pubkey.as_bytes());

        let destination = engine
            .repositories()
            .destination
            .get_by_locking_script(txn, &script_hex)
            .await?;
        let destination = match destination {
            Some(d) => d,
            None => continue,
        };

        if !out_ids.contains(&destination.xpub_id) {
            out_ids.push(destination.xpub_id.clone());
        }
        *deltas.entry(destination.xpub_id.clone()).or_insert(0) += value as i64;

        // Zero-value outputs (data scripts) are tracked through the
        // transaction row only
        if value > 0 {
            staged.push(Utxo::new(
                &tx.id,
                vout as u32,
                &destination.xpub_id,
                value,
                &script_hex,
            ));
        }
    }

    let is_external = tx.draft_id.is_none();
    if is_external
        && engine.config().incoming_transaction_checking
        && out_ids.is_empty()
        && in_ids.is_empty()
    {
        return Err(WalletError::NoMatchingOutputs);
    }

    tx.total_value = total_out;
    tx.fee = match &draft {
        Some(d) => d.configuration.fee,
        // Without every previous output the real fee is unknowable here
        None => known_inputs.saturating_sub(total_out),
    };
    tx.xpub_in_ids = in_ids;
    tx.xpub_out_ids = out_ids;
    tx.xpub_output_value = deltas;
    tx.staged_utxos = staged;

    debug!(
        txid = %tx.id,
        inputs = tx.number_of_inputs,
        outputs = tx.number_of_outputs,
        owners = tx.xpub_output_value.len(),
        external = is_external,
        "transaction processed"
    );
    Ok(())
}

async fn load_draft(
    engine: &Engine,
    txn: &DatabaseTransaction,
    tx: &Transaction,
) -> Result<Option<DraftTransaction>, WalletError> {
    let draft_id = match &tx.draft_id {
        Some(id) => id,
        None => return Ok(None),
    };

    let model = engine
        .repositories()
        .draft_transaction
        .get_by_id(txn, draft_id)
        .await?
        .ok_or(WalletError::DraftNotFound)?;
    let draft = DraftTransaction::from_entity(model);

    if let Some(recording_xpub_id) = &tx.recording_xpub_id {
        if &draft.xpub_id != recording_xpub_id {
            return Err(WalletError::XpubIdMismatch);
        }
    }
    if draft.status == DraftStatus::Complete {
        return Err(WalletError::TransactionAlreadyRecorded);
    }

    Ok(Some(draft))
}
