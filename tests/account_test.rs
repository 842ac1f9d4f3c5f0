mod common;

use common::{test_engine, TEST_XPUB};
use wallet_engine::{auth, utils, WalletError};

#[tokio::test]
async fn xpub_registration_round_trips_through_the_cache() {
    let (engine, _db) = test_engine().await;

    let created = engine
        .new_xpub(TEST_XPUB, Some(serde_json::json!({"label": "primary"})))
        .await
        .unwrap();
    assert_eq!(created.id, utils::hash(TEST_XPUB));
    assert_eq!(created.current_balance, 0);

    let fetched = engine.get_xpub(TEST_XPUB).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(
        fetched.metadata,
        Some(serde_json::json!({"label": "primary"}))
    );
}

#[tokio::test]
async fn unknown_xpub_lookup_fails() {
    let (engine, _db) = test_engine().await;
    assert!(matches!(
        engine.get_xpub(TEST_XPUB).await,
        Err(WalletError::MissingXpub)
    ));
}

#[tokio::test]
async fn metadata_update_is_visible_on_the_next_read() {
    let (engine, _db) = test_engine().await;
    engine.new_xpub(TEST_XPUB, None).await.unwrap();

    engine
        .update_xpub_metadata(TEST_XPUB, Some(serde_json::json!({"plan": "pro"})))
        .await
        .unwrap();
    let xpub = engine.get_xpub(TEST_XPUB).await.unwrap();
    assert_eq!(xpub.metadata, Some(serde_json::json!({"plan": "pro"})));
}

#[tokio::test]
async fn destinations_advance_the_external_chain() {
    let (engine, _db) = test_engine().await;
    engine.new_xpub(TEST_XPUB, None).await.unwrap();

    let first = engine.new_destination(TEST_XPUB, None).await.unwrap();
    let second = engine.new_destination(TEST_XPUB, None).await.unwrap();
    assert_eq!(first.num, 0);
    assert_eq!(second.num, 1);
    assert_ne!(first.address, second.address);

    let by_address = engine
        .get_destination_by_address(&first.address)
        .await
        .unwrap();
    assert_eq!(by_address.id, first.id);
    let by_script = engine
        .get_destination_by_locking_script(&second.locking_script)
        .await
        .unwrap();
    assert_eq!(by_script.id, second.id);
}

#[tokio::test]
async fn concurrent_derivations_claim_distinct_indices() {
    let (engine, _db) = test_engine().await;
    engine.new_xpub(TEST_XPUB, None).await.unwrap();

    // Each derivation claims its index with a single increment-and-return
    // statement, so parallel calls can never end up on the same one.
    let (a, b) = tokio::join!(
        engine.new_destination(TEST_XPUB, None),
        engine.new_destination(TEST_XPUB, None),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert_ne!(a.num, b.num);
    assert_ne!(a.address, b.address);
    let mut nums = vec![a.num, b.num];
    nums.sort_unstable();
    assert_eq!(nums, vec![0, 1]);
}

#[tokio::test]
async fn access_keys_authenticate_until_revoked() {
    let (engine, _db) = test_engine().await;
    engine.new_xpub(TEST_XPUB, None).await.unwrap();

    let access_key = engine.new_access_key(TEST_XPUB).await.unwrap();
    // The private key is only handed out at creation time
    let private_key = access_key.key.clone().expect("fresh key material");
    assert!(engine.get_access_key(&access_key.id).await.unwrap().key.is_none());

    let body = r#"{"op":"balance"}"#;
    let payload = auth::create_access_key_signature(&private_key, body).unwrap();
    let authenticated = auth::authenticate_access_key(&engine, &payload, body)
        .await
        .unwrap();
    assert_eq!(authenticated.id, access_key.id);

    engine
        .revoke_access_key(TEST_XPUB, &access_key.id)
        .await
        .unwrap();
    let result = auth::authenticate_access_key(&engine, &payload, body).await;
    assert!(matches!(result, Err(WalletError::AccessKeyRevoked)));
}

#[tokio::test]
async fn revoking_someone_elses_key_is_rejected() {
    let (engine, _db) = test_engine().await;
    engine.new_xpub(TEST_XPUB, None).await.unwrap();
    // BIP32 test vector 2
    let other = "xpub661MyMwAqRbcFW31YEwpkMuc5THy2PSt5bDMsktWQcFF8syAmRUapSCGu8ED9W6oDMSgv6Zz8idoc4a6mr8BDzTJY47LJhkJ8UB7WEGuduB";
    engine.new_xpub(other, None).await.unwrap();

    let access_key = engine.new_access_key(TEST_XPUB).await.unwrap();
    let result = engine.revoke_access_key(other, &access_key.id).await;
    assert!(matches!(result, Err(WalletError::XpubIdMismatch)));
}
