mod common;

use common::{seed_funded_xpub, seeded_txid, test_engine, TEST_XPUB};
use wallet_engine::{ScriptType, UtxoPointer, WalletError};

#[tokio::test]
async fn reserve_claims_just_enough_outputs() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 5, 1225).await;

    // 2000 sat target at 0.5 sat/byte: the first utxo leaves the target
    // plus the per-input fee uncovered, the second covers it.
    let reserved = engine
        .reserve_utxos(TEST_XPUB, "draft-1", 2000, 0.5, None)
        .await
        .unwrap();

    assert_eq!(reserved.len(), 2);
    for utxo in &reserved {
        assert_eq!(utxo.draft_id.as_deref(), Some("draft-1"));
        assert!(utxo.reserved_at.is_some());
    }

    let spendable = engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[]).await.unwrap();
    assert_eq!(spendable.len(), 3);
}

#[tokio::test]
async fn reserve_shortfall_releases_every_claim() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 5, 1225).await;

    let result = engine
        .reserve_utxos(TEST_XPUB, "draft-1", 20_000, 0.5, None)
        .await;
    assert!(matches!(result, Err(WalletError::NotEnoughUtxos)));

    // Nothing stays reserved after a failed reservation
    let spendable = engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[]).await.unwrap();
    assert_eq!(spendable.len(), 5);
}

#[tokio::test]
async fn unreserve_is_idempotent() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 5, 1225).await;

    engine
        .reserve_utxos(TEST_XPUB, "draft-1", 2000, 0.5, None)
        .await
        .unwrap();
    assert_eq!(
        engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[]).await.unwrap().len(),
        3
    );

    engine.unreserve_utxos(TEST_XPUB, "draft-1").await.unwrap();
    engine.unreserve_utxos(TEST_XPUB, "draft-1").await.unwrap();

    let spendable = engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[]).await.unwrap();
    assert_eq!(spendable.len(), 5);
}

#[tokio::test]
async fn unreserve_of_unknown_draft_is_a_no_op() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 2, 1225).await;

    engine.unreserve_utxos(TEST_XPUB, "no-such-draft").await.unwrap();
    assert_eq!(
        engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[]).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn reserve_honors_the_allow_list() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 5, 1225).await;

    // Only permit the third seeded outpoint
    let allowed = vec![UtxoPointer {
        transaction_id: seeded_txid(2),
        output_index: 0,
    }];
    let reserved = engine
        .reserve_utxos(TEST_XPUB, "draft-1", 1000, 0.0, Some(&allowed))
        .await
        .unwrap();
    assert_eq!(reserved.len(), 1);
    assert_eq!(reserved[0].transaction_id, seeded_txid(2));

    // The allow list cannot stretch beyond its own value
    let result = engine
        .reserve_utxos(TEST_XPUB, "draft-2", 2000, 0.0, Some(&allowed))
        .await;
    assert!(matches!(result, Err(WalletError::NotEnoughUtxos)));
}

#[tokio::test]
async fn spendable_respects_the_exclude_list() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 3, 1225).await;

    let exclude = vec![
        UtxoPointer {
            transaction_id: seeded_txid(0),
            output_index: 0,
        },
        UtxoPointer {
            transaction_id: seeded_txid(1),
            output_index: 0,
        },
    ];
    let spendable = engine.get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &exclude).await.unwrap();
    assert_eq!(spendable.len(), 1);
    assert_eq!(spendable[0].transaction_id, seeded_txid(2));
}

#[tokio::test]
async fn two_drafts_never_share_an_output() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 4, 1225).await;

    let first = engine
        .reserve_utxos(TEST_XPUB, "draft-a", 2000, 0.5, None)
        .await
        .unwrap();
    let second = engine
        .reserve_utxos(TEST_XPUB, "draft-b", 1000, 0.5, None)
        .await
        .unwrap();

    for utxo in &second {
        assert!(
            !first.iter().any(|f| f.id == utxo.id),
            "output {} reserved twice",
            utxo.id
        );
    }
}

#[tokio::test]
async fn racing_reservations_never_share_an_output() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 5, 1225).await;

    // Both drafts walk the same candidate set at the same time; the
    // conditional claim decides who gets each output.
    let (first, second) = tokio::join!(
        engine.reserve_utxos(TEST_XPUB, "draft-a", 2000, 0.5, None),
        engine.reserve_utxos(TEST_XPUB, "draft-b", 2000, 0.5, None),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    for utxo in &second {
        assert!(
            !first.iter().any(|f| f.id == utxo.id),
            "output {} claimed by both drafts",
            utxo.id
        );
    }
    assert_eq!(
        engine
            .get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[])
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn spendable_is_scoped_to_the_script_type() {
    let (engine, _db) = test_engine().await;
    seed_funded_xpub(&engine, 2, 1225).await;

    let spendable = engine
        .get_spendable_utxos(TEST_XPUB, ScriptType::PubKeyHash, &[])
        .await
        .unwrap();
    assert_eq!(spendable.len(), 2);

    // Nothing of another type is tracked for this account
    let other = engine
        .get_spendable_utxos(TEST_XPUB, ScriptType::ScriptHash, &[])
        .await
        .unwrap();
    assert!(other.is_empty());
}
