use std::time::Duration;

use bitcoin::Network;
use tempfile::TempDir;

use wallet_engine::infrastructure::persistence;
use wallet_engine::{Engine, EngineConfig, FeeUnit, Utxo};

// BIP32 test vector 1
pub const TEST_XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";
#[allow(dead_code)]
pub const TEST_XPRIV: &str = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";

#[allow(dead_code)]
pub const PAY_TO_ADDRESS: &str = "1CfaQw9udYNPccssFJFZ94DN8MqNZm9nGt";

pub fn test_config() -> EngineConfig {
    EngineConfig {
        network: Network::Bitcoin,
        fee_unit: FeeUnit {
            satoshis: 500,
            bytes: 1000,
        },
        dust_limit: 1,
        change_minimum_satoshis: 1250,
        change_number_of_destinations: 1,
        draft_expires_in: Duration::from_secs(20),
        incoming_transaction_checking: true,
        input_utxo_checking: true,
        default_from_paymail: "test@localhost".to_string(),
        default_note: "test".to_string(),
        utxo_page_size: 20,
    }
}

/// Engine over a throwaway sqlite file; the TempDir keeps it alive.
pub async fn test_engine() -> (Engine, TempDir) {
    test_engine_with(test_config()).await
}

#[allow(dead_code)]
pub async fn test_engine_with(config: EngineConfig) -> (Engine, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("wallet.db").display());
    let engine = Engine::builder()
        .config(config)
        .database_url(&url)
        .create_tables()
        .build()
        .await
        .expect("engine");
    (engine, dir)
}

/// Register the test xpub, derive one receiving destination and fund it
/// with `count` utxos of `satoshis` each. The account balance is credited
/// to match. Returns the funded locking script hex.
#[allow(dead_code)]
pub async fn seed_funded_xpub(engine: &Engine, count: u32, satoshis: u64) -> String {
    engine
        .new_xpub(TEST_XPUB, None)
        .await
        .expect("xpub registered");
    let destination = engine
        .new_destination(TEST_XPUB, None)
        .await
        .expect("destination derived");

    let xpub_id = destination.xpub_id.clone();
    for i in 0..count {
        let txid = format!("{:064x}", u64::from(i) + 1);
        let mut utxo = Utxo::new(&txid, 0, &xpub_id, satoshis, &destination.locking_script);
        persistence::save(engine, &mut utxo).await.expect("utxo saved");
    }
    engine
        .repositories()
        .xpub
        .increment_balance(
            engine.pool().connection(),
            &xpub_id,
            (u64::from(count) * satoshis) as i64,
        )
        .await
        .expect("balance seeded");

    destination.locking_script
}

#[allow(dead_code)]
pub fn seeded_txid(i: u32) -> String {
    format!("{:064x}", u64::from(i) + 1)
}
