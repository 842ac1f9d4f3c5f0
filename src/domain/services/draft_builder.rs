use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Txid, Witness};
use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::DatabaseTransaction;
use tracing::debug;

use crate::application::engine::Engine;
use crate::domain::errors::WalletError;
use crate::domain::models::{
    ChangeStrategy, Destination, DraftTransaction, ScriptOutput, TransactionInput,
    TransactionOutput, Utxo, UtxoPointer,
};
use crate::domain::services::{change, fees, outputs};
use crate::infrastructure::persistence::repositories::DerivationBranch;
use crate::utils::keys;
use crate::utils::scripts::ScriptType;

/// Turn a draft's requested configuration into a fully specified unsigned
/// transaction: resolve outputs, reserve inputs, derive change and compute
/// the fee.
///
/// Runs inside the draft's create hook, on the save transaction, so a
/// failed build rolls back the reservations with everything else.
pub async fn build_draft(
    engine: &Engine,
    txn: &DatabaseTransaction,
    draft: &mut DraftTransaction,
) -> Result<(), WalletError> {
    apply_defaults(engine, draft);

    // Fail before touching reservations
    if draft.configuration.change_destinations_strategy == ChangeStrategy::Nominations {
        return Err(WalletError::ChangeStrategyNotImplemented);
    }

    if !draft.configuration.send_all_to.is_empty() {
        build_send_all(engine, txn, draft).await?;
    } else {
        build_regular(engine, txn, draft).await?;
    }

    draft.hex = assemble_hex(&draft.configuration.inputs, &draft.configuration.outputs)?;
    debug!(
        draft_id = %draft.id,
        inputs = draft.configuration.inputs.len(),
        fee = draft.configuration.fee,
        change = draft.configuration.change_satoshis,
        "draft built"
    );
    Ok(())
}

fn apply_defaults(engine: &Engine, draft: &mut DraftTransaction) {
    let defaults = engine.config();
    let config = &mut draft.configuration;

    if config.fee_unit.is_none() {
        config.fee_unit = Some(defaults.fee_unit);
    }
    if config.change_minimum_satoshis == 0 {
        config.change_minimum_satoshis = defaults.change_minimum_satoshis;
    }
    if config.change_number_of_destinations == 0 {
        config.change_number_of_destinations = defaults.change_number_of_destinations;
    }
    if config.expires_in_secs == 0 {
        config.expires_in_secs = defaults.draft_expires_in.as_secs();
    }
    draft.expires_at =
        Utc::now() + ChronoDuration::seconds(config.expires_in_secs.min(i64::MAX as u64) as i64);
}

async fn build_regular(
    engine: &Engine,
    txn: &DatabaseTransaction,
    draft: &mut DraftTransaction,
) -> Result<(), WalletError> {
    if draft.configuration.outputs.is_empty() {
        return Err(WalletError::MissingTransactionOutputs);
    }

    let mut resolved_outputs = std::mem::take(&mut draft.configuration.outputs);
    for output in resolved_outputs.iter_mut() {
        outputs::process_output(engine, output).await?;
    }
    draft.configuration.outputs = resolved_outputs;

    let satoshis_needed: u64 = draft
        .configuration
        .outputs
        .iter()
        .flat_map(|o| o.scripts.iter())
        .map(|s| s.satoshis)
        .sum();

    let fee_unit = draft.configuration.fee_unit.unwrap_or(engine.config().fee_unit);
    let reserved = engine
        .repositories()
        .utxo
        .reserve_utxos(
            txn,
            &draft.id,
            &draft.xpub_id,
            satoshis_needed,
            fee_unit.rate(),
            draft.configuration.from_utxos.as_deref(),
        )
        .await?;

    draft.configuration.inputs = inputs_from_reserved(engine, txn, reserved).await?;
    let total_in: u64 = draft.configuration.inputs.iter().map(|i| i.utxo.satoshis).sum();

    let base_fee = fees::estimate_fee(fee_unit, &draft.configuration);
    if total_in < satoshis_needed + base_fee {
        return Err(WalletError::NotEnoughUtxos);
    }
    let change = total_in - satoshis_needed - base_fee;

    if change <= engine.config().dust_limit {
        // Too small to be worth an output; absorbed by the fee
        draft.configuration.change_satoshis = 0;
        draft.configuration.fee = total_in - satoshis_needed;
        return Ok(());
    }

    let destination_count = if change < draft.configuration.change_minimum_satoshis {
        1
    } else {
        draft.configuration.change_number_of_destinations.max(1)
    };

    let destinations =
        derive_change_destinations(engine, txn, draft, destination_count).await?;

    // Adding change outputs grows the transaction, so re-estimate with the
    // provisional outputs in place and give the difference back to the fee.
    let mut provisional = draft.configuration.clone();
    for destination in &destinations {
        provisional.outputs.push(change_output(destination, 0));
    }
    let fee_with_change = fees::estimate_fee(fee_unit, &provisional);
    let change_after_fee = total_in
        .saturating_sub(satoshis_needed)
        .saturating_sub(fee_with_change);

    if change_after_fee <= engine.config().dust_limit {
        draft.configuration.change_satoshis = 0;
        draft.configuration.fee = total_in - satoshis_needed;
        return Ok(());
    }

    let amounts = change::split_change(
        change_after_fee,
        destinations.len() as u32,
        draft.configuration.change_destinations_strategy,
    )?;

    for (destination, amount) in destinations.iter().zip(amounts.iter()) {
        draft
            .configuration
            .outputs
            .push(change_output(destination, *amount));
        draft.configuration.change_destinations.push(destination.clone());
    }
    // Stage them for the draft's transaction
    draft.staged_destinations = destinations;

    draft.configuration.change_satoshis = change_after_fee;
    draft.configuration.fee = fee_with_change;
    Ok(())
}

async fn build_send_all(
    engine: &Engine,
    txn: &DatabaseTransaction,
    draft: &mut DraftTransaction,
) -> Result<(), WalletError> {
    if !draft.configuration.outputs.is_empty() {
        return Err(WalletError::InvalidOpReturnOutput(
            "send_all_to cannot be combined with outputs".to_string(),
        ));
    }

    let fee_unit = draft.configuration.fee_unit.unwrap_or(engine.config().fee_unit);

    // Snapshot the spendable p2pkh set, then reserve exactly that set. A
    // concurrent claim in between surfaces as NotEnoughUtxos and the
    // caller can retry. The type filter keeps outputs the fee table
    // cannot size out of the sweep.
    let spendable = engine
        .repositories()
        .utxo
        .get_spendable(txn, &draft.xpub_id, ScriptType::PubKeyHash, &[])
        .await?;
    let restricted: Vec<_> = match &draft.configuration.from_utxos {
        Some(pointers) => {
            let allowed: Vec<String> = pointers
                .iter()
                .map(|p| crate::utils::utxo_id(&p.transaction_id, p.output_index))
                .collect();
            spendable
                .into_iter()
                .filter(|u| allowed.contains(&u.id))
                .collect()
        }
        None => spendable,
    };
    if restricted.is_empty() {
        return Err(WalletError::NotEnoughUtxos);
    }
    let total: u64 = restricted.iter().map(|u| u.satoshis.max(0) as u64).sum();
    let sweep_list: Vec<UtxoPointer> = restricted
        .iter()
        .map(|u| UtxoPointer {
            transaction_id: u.transaction_id.clone(),
            output_index: u.output_index.max(0) as u32,
        })
        .collect();

    let reserved = engine
        .repositories()
        .utxo
        .reserve_utxos(txn, &draft.id, &draft.xpub_id, total, 0.0, Some(&sweep_list))
        .await?;

    draft.configuration.inputs = inputs_from_reserved(engine, txn, reserved).await?;
    let total_in: u64 = draft.configuration.inputs.iter().map(|i| i.utxo.satoshis).sum();

    let mut output = TransactionOutput {
        to: draft.configuration.send_all_to.clone(),
        satoshis: total_in,
        ..Default::default()
    };
    outputs::process_output(engine, &mut output).await?;
    draft.configuration.outputs = vec![output];

    let fee = fees::estimate_fee(fee_unit, &draft.configuration);
    if total_in <= fee + engine.config().dust_limit {
        return Err(WalletError::OutputValueTooLow);
    }

    // Deduct the fee from the single output
    let send = total_in - fee;
    if let Some(output) = draft.configuration.outputs.first_mut() {
        output.satoshis = send;
        for script in output.scripts.iter_mut() {
            script.satoshis = send;
        }
    }

    draft.configuration.change_satoshis = 0;
    draft.configuration.fee = fee;
    Ok(())
}

async fn inputs_from_reserved(
    engine: &Engine,
    txn: &DatabaseTransaction,
    reserved: Vec<crate::infrastructure::persistence::entities::utxos::Model>,
) -> Result<Vec<TransactionInput>, WalletError> {
    let mut inputs = Vec::with_capacity(reserved.len());
    for model in reserved {
        let destination = engine
            .repositories()
            .destination
            .get_by_locking_script(txn, &model.script_pub_key)
            .await?
            .ok_or(WalletError::MissingDestination)?;
        inputs.push(TransactionInput {
            utxo: Utxo::from_entity(model),
            destination: Destination::from_entity(destination),
        });
    }
    Ok(inputs)
}

async fn derive_change_destinations(
    engine: &Engine,
    txn: &DatabaseTransaction,
    draft: &DraftTransaction,
    count: u32,
) -> Result<Vec<Destination>, WalletError> {
    let raw_key = draft
        .raw_xpub_key
        .as_deref()
        .ok_or(WalletError::MissingRequiredXpub)?;
    let hd_key = keys::validate_xpub(raw_key)?;

    let mut destinations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let num = engine
            .repositories()
            .xpub
            .increment_next_num(txn, &draft.xpub_id, DerivationBranch::Internal)
            .await?;
        let (address, script) = keys::derive_address(
            &hd_key,
            keys::CHAIN_INTERNAL,
            num,
            engine.config().network,
        )?;
        let mut destination = Destination::new(
            &draft.xpub_id,
            &script,
            keys::CHAIN_INTERNAL,
            num,
            &address,
        );
        destination.draft_id = Some(draft.id.clone());
        destinations.push(destination);
    }
    Ok(destinations)
}

fn change_output(destination: &Destination, satoshis: u64) -> TransactionOutput {
    TransactionOutput {
        to: destination.address.clone(),
        satoshis,
        scripts: vec![ScriptOutput {
            address: destination.address.clone(),
            satoshis,
            script: destination.locking_script.clone(),
            script_type: Some(destination.script_type),
        }],
        ..Default::default()
    }
}

/// Serialize the resolved configuration into unsigned transaction hex.
fn assemble_hex(
    inputs: &[TransactionInput],
    outputs: &[TransactionOutput],
) -> Result<String, WalletError> {
    let mut tx_inputs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let txid = Txid::from_str(&input.utxo.transaction_id)
            .map_err(|e| WalletError::InvalidHex(e.to_string()))?;
        tx_inputs.push(TxIn {
            previous_output: OutPoint {
                txid,
                vout: input.utxo.output_index,
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        });
    }

    let mut tx_outputs = Vec::new();
    for output in outputs {
        for script in &output.scripts {
            let bytes =
                hex::decode(&script.script).map_err(|e| WalletError::InvalidHex(e.to_string()))?;
            tx_outputs.push(TxOut {
                value: Amount::from_sat(script.satoshis),
                script_pubkey: ScriptBuf::from(bytes),
            });
        }
    }

    let tx = bitcoin::Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: tx_inputs,
        output: tx_outputs,
    };
    Ok(bitcoin::consensus::encode::serialize_hex(&tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils;

    const P2PKH_SCRIPT: &str = "76a9147ff514e6ae3deb46e6644caac5cdd0bf2388906588ac";
    const TXID: &str = "9b0fc92260312ce44e74ef369f5c66bbb85848f2eddd5a7a1cde251e54ccfdd5";

    #[test]
    fn assembles_unsigned_hex() {
        let utxo = Utxo::new(TXID, 0, "xpub-id", 5000, P2PKH_SCRIPT);
        let destination = Destination::new("xpub-id", P2PKH_SCRIPT, 0, 0, "addr");
        let inputs = vec![TransactionInput { utxo, destination }];
        let outputs = vec![TransactionOutput {
            scripts: vec![ScriptOutput {
                script: P2PKH_SCRIPT.to_string(),
                satoshis: 4000,
                ..Default::default()
            }],
            ..Default::default()
        }];

        let hex_tx = assemble_hex(&inputs, &outputs).unwrap();
        let parsed = crate::domain::models::transaction::parse_transaction(&hex_tx).unwrap();
        assert_eq!(parsed.input.len(), 1);
        assert_eq!(parsed.output.len(), 1);
        assert_eq!(parsed.input[0].previous_output.txid.to_string(), TXID);
        assert_eq!(parsed.output[0].value.to_sat(), 4000);
        assert_eq!(
            hex::encode(parsed.output[0].script_pubkey.as_bytes()),
            P2PKH_SCRIPT
        );
    }

    #[test]
    fn assemble_rejects_bad_txid() {
        let utxo = Utxo::new("not-a-txid", 0, "xpub-id", 5000, P2PKH_SCRIPT);
        assert_eq!(utxo.id, utils::utxo_id("not-a-txid", 0));
        let destination = Destination::new("xpub-id", P2PKH_SCRIPT, 0, 0, "addr");
        let inputs = vec![TransactionInput { utxo, destination }];
        assert!(assemble_hex(&inputs, &[]).is_err());
    }
}
