use std::env;
use std::time::Duration;

use bitcoin::Network;
use dotenv::dotenv;

use crate::domain::models::FeeUnit;

/// Immutable engine configuration, constructed once at startup and handed
/// to the [`crate::Engine`] builder. There is no ambient global state; every
/// component reads the values it needs from this struct.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Network used for address encoding and script parsing
    pub network: Network,
    /// Default fee unit applied to drafts that do not carry one
    pub fee_unit: FeeUnit,
    /// Outputs below this value are considered uneconomical
    pub dust_limit: u64,
    /// Smallest per-destination change output before collapsing to one
    pub change_minimum_satoshis: u64,
    /// Default number of change destinations per draft
    pub change_number_of_destinations: u32,
    /// How long a draft stays reservable before the sweep expires it
    pub draft_expires_in: Duration,
    /// Require external transactions to hit at least one known destination
    pub incoming_transaction_checking: bool,
    /// Require spent inputs to hold a reservation matching the draft being
    /// recorded. Switching this off skips the reservation match only; the
    /// double-spend guard always applies
    pub input_utxo_checking: bool,
    /// Sender paymail used for basic address resolution requests
    pub default_from_paymail: String,
    /// Purpose / note string sent with paymail resolution requests
    pub default_note: String,
    /// Page size used when walking candidate utxos during reservation
    pub utxo_page_size: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
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
            default_from_paymail: "engine@localhost".to_string(),
            default_note: "wallet engine payment".to_string(),
            utxo_page_size: 20,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> Self {
        // Ensure .env file is loaded
        dotenv().ok();

        let defaults = Self::default();

        let network = env::var("WALLET_NETWORK")
            .ok()
            .and_then(|v| v.parse::<Network>().ok())
            .unwrap_or(defaults.network);

        Self {
            network,
            fee_unit: FeeUnit {
                satoshis: env_u64("WALLET_FEE_SATOSHIS", defaults.fee_unit.satoshis),
                bytes: env_u64("WALLET_FEE_BYTES", defaults.fee_unit.bytes),
            },
            dust_limit: env_u64("WALLET_DUST_LIMIT", defaults.dust_limit),
            change_minimum_satoshis: env_u64(
                "WALLET_CHANGE_MINIMUM_SATOSHIS",
                defaults.change_minimum_satoshis,
            ),
            change_number_of_destinations: env_u64(
                "WALLET_CHANGE_DESTINATIONS",
                defaults.change_number_of_destinations as u64,
            ) as u32,
            draft_expires_in: Duration::from_secs(env_u64(
                "WALLET_DRAFT_EXPIRES_SECS",
                defaults.draft_expires_in.as_secs(),
            )),
            incoming_transaction_checking: env::var("WALLET_ITC_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.incoming_transaction_checking),
            input_utxo_checking: env::var("WALLET_IUC_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.input_utxo_checking),
            default_from_paymail: env::var("WALLET_FROM_PAYMAIL")
                .unwrap_or(defaults.default_from_paymail),
            default_note: env::var("WALLET_PAYMAIL_NOTE").unwrap_or(defaults.default_note),
            utxo_page_size: env_u64("WALLET_UTXO_PAGE_SIZE", defaults.utxo_page_size),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.fee_unit.satoshis, 500);
        assert_eq!(config.fee_unit.bytes, 1000);
        assert!(config.incoming_transaction_checking);
        assert!(config.input_utxo_checking);
        assert_eq!(config.change_number_of_destinations, 1);
        assert!(config.dust_limit > 0);
    }
}
