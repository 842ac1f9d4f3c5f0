mod common;

use chrono::Utc;
use common::{seed_funded_xpub, test_config, test_engine, test_engine_with, PAY_TO_ADDRESS, TEST_XPUB};
use wallet_engine::{
    ChangeStrategy, DraftStatus, FeeUnit, OpReturn, ScriptType, TransactionConfig,
    TransactionOutput, WalletError,
};

fn pay_config(satoshis: u64) -> TransactionConfig {
    TransactionConfig {
        outputs: vec![TransactionOutput {
            to: PAY_TO_ADDRESS.to_string(),
            satoshis,
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn draft_balances_inputs_fee_and_change() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 5, 1225).await;

    let draft = engine
        .new_draft_transaction(TEST_XPUB, pay_config(2000))
        .await
        .unwrap();

    assert_eq!(draft.status, DraftStatus::Draft);
    assert_eq!(draft.configuration.inputs.len(), 2);

    let total_in: u64 = draft.configuration.inputs.iter().map(|i| i.utxo.satoshis).sum();
    assert_eq!(total_in, 2450);

    // 2 p2pkh inputs, payment output and one change output at 0.5 sat/byte
    assert_eq!(draft.configuration.fee, 187);
    assert_eq!(draft.configuration.change_satoshis, 263);
    assert_eq!(
        2000 + draft.configuration.fee + draft.configuration.change_satoshis,
        total_in
    );

    // One internal-chain change destination was derived
    assert_eq!(draft.configuration.change_destinations.len(), 1);
    assert_eq!(draft.configuration.change_destinations[0].chain, 1);

    // The unsigned hex carries payment and change outputs
    let parsed = bitcoin::consensus::deserialize::<bitcoin::Transaction>(
        &hex::decode(&draft.hex).unwrap(),
    )
    .unwrap();
    assert_eq!(parsed.input.len(), 2);
    assert_eq!(parsed.output.len(), 2);
    assert_eq!(parsed.output[0].value.to_sat(), 2000);
    assert_eq!(parsed.output[1].value.to_sat(), 263);

    // Inputs are reserved for this draft
    let spendable = engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[]).await.unwrap();
    assert_eq!(spendable.len(), 3);

    // Expiry sits in the near future
    let ttl = draft.expires_at - Utc::now();
    assert!(ttl.num_seconds() > 15 && ttl.num_seconds() <= 21);
}

#[tokio::test]
async fn draft_fee_scales_with_the_fee_unit() {
    let mut config = test_config();
    config.fee_unit = FeeUnit {
        satoshis: 1000,
        bytes: 1000,
    };
    let (engine, _db) = test_engine_with(config).await;
    seed_funded_xpub(&engine, 5, 1225).await;

    let draft = engine
        .new_draft_transaction(TEST_XPUB, pay_config(2000))
        .await
        .unwrap();

    assert_eq!(draft.configuration.inputs.len(), 2);
    assert_eq!(draft.configuration.fee, 374);
    assert_eq!(draft.configuration.change_satoshis, 76);
}

#[tokio::test]
async fn draft_without_outputs_fails_clean() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 3, 1225).await;

    let result = engine
        .new_draft_transaction(TEST_XPUB, TransactionConfig::default())
        .await;
    assert!(matches!(result, Err(WalletError::MissingTransactionOutputs)));

    // No draft row and no reservations left behind
    let spendable = engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[]).await.unwrap();
    assert_eq!(spendable.len(), 3);
}

#[tokio::test]
async fn draft_beyond_the_balance_fails_clean() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 5, 1225).await;

    let result = engine
        .new_draft_transaction(TEST_XPUB, pay_config(20_000))
        .await;
    assert!(matches!(result, Err(WalletError::NotEnoughUtxos)));

    let spendable = engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[]).await.unwrap();
    assert_eq!(spendable.len(), 5);
}

#[tokio::test]
async fn nominations_strategy_fails_before_reserving() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 3, 1225).await;

    let mut config = pay_config(1000);
    config.change_destinations_strategy = ChangeStrategy::Nominations;

    let result = engine.new_draft_transaction(TEST_XPUB, config).await;
    assert!(matches!(
        result,
        Err(WalletError::ChangeStrategyNotImplemented)
    ));
    assert_eq!(
        engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[]).await.unwrap().len(),
        3
    );
}

#[tokio::test]
async fn op_return_draft_still_pays_a_fee_from_an_input() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 2, 1225).await;

    let config = TransactionConfig {
        outputs: vec![TransactionOutput {
            op_return: Some(OpReturn {
                string_parts: Some(vec!["hello".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }],
        ..Default::default()
    };
    let draft = engine.new_draft_transaction(TEST_XPUB, config).await.unwrap();

    assert_eq!(draft.configuration.inputs.len(), 1);
    // Data output plus derived change output
    assert_eq!(draft.configuration.outputs.len(), 2);
    assert_eq!(draft.configuration.outputs[0].scripts[0].satoshis, 0);
    assert!(draft.configuration.outputs[0].scripts[0].script.starts_with("006a"));
    assert_eq!(
        draft.configuration.fee + draft.configuration.change_satoshis,
        1225
    );
}

#[tokio::test]
async fn op_return_with_satoshis_is_rejected() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 2, 1225).await;

    let config = TransactionConfig {
        outputs: vec![TransactionOutput {
            satoshis: 100,
            op_return: Some(OpReturn {
                string_parts: Some(vec!["hello".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }],
        ..Default::default()
    };
    assert!(matches!(
        engine.new_draft_transaction(TEST_XPUB, config).await,
        Err(WalletError::InvalidOpReturnOutput(_))
    ));
}

#[tokio::test]
async fn send_all_sweeps_the_account() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 5, 1225).await;

    let config = TransactionConfig {
        send_all_to: PAY_TO_ADDRESS.to_string(),
        ..Default::default()
    };
    let draft = engine.new_draft_transaction(TEST_XPUB, config).await.unwrap();

    assert_eq!(draft.configuration.inputs.len(), 5);
    assert_eq!(draft.configuration.change_satoshis, 0);
    // 10 + 5*148 + 34 bytes at 0.5 sat/byte
    assert_eq!(draft.configuration.fee, 392);
    assert_eq!(
        draft.configuration.outputs[0].scripts[0].satoshis,
        6125 - draft.configuration.fee
    );

    assert!(engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn cancel_releases_the_reservations() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 5, 1225).await;

    let draft = engine
        .new_draft_transaction(TEST_XPUB, pay_config(2000))
        .await
        .unwrap();
    assert_eq!(
        engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[]).await.unwrap().len(),
        3
    );

    let canceled = engine
        .cancel_draft_transaction(TEST_XPUB, &draft.id)
        .await
        .unwrap();
    assert_eq!(canceled.status, DraftStatus::Canceled);

    let spendable = engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[]).await.unwrap();
    assert_eq!(spendable.len(), 5);

    // Canceling again is a no-op
    let again = engine
        .cancel_draft_transaction(TEST_XPUB, &draft.id)
        .await
        .unwrap();
    assert_eq!(again.status, DraftStatus::Canceled);
}

#[tokio::test]
async fn draft_for_unknown_xpub_is_rejected() {
    let (engine, _db) = test_engine().await;

    let result = engine
        .new_draft_transaction(TEST_XPUB, pay_config(1000))
        .await;
    assert!(matches!(result, Err(WalletError::MissingXpub)));
}
