use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::models::{Destination, Utxo};
use crate::utils::scripts::ScriptType;

/// Fee policy: `satoshis` per `bytes` (e.g. 500 sat / 1000 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeUnit {
    pub satoshis: u64,
    pub bytes: u64,
}

impl FeeUnit {
    pub fn rate(&self) -> f64 {
        self.satoshis as f64 / self.bytes as f64
    }
}

/// How change is split over the change destinations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStrategy {
    #[default]
    Default,
    Random,
    /// Reserved in the configuration surface but not implemented; the
    /// builder fails fast instead of guessing a fallback.
    Nominations,
}

/// Reference to a specific utxo by outpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoPointer {
    pub transaction_id: String,
    pub output_index: u32,
}

/// OP_RETURN payload in one of its accepted shapes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpReturn {
    /// Complete locking script hex, used as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
    /// Hex data parts, each pushed separately
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex_parts: Option<Vec<String>>,
    /// UTF-8 string parts, each pushed separately
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_parts: Option<Vec<String>>,
    /// Structured MAP protocol payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MapProtocol>,
}

/// MAP ("Magic Attribute Protocol") key/value payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapProtocol {
    pub app: String,
    #[serde(rename = "type")]
    pub map_type: String,
    pub keys: BTreeMap<String, String>,
}

/// A resolved `(script, satoshis)` pair produced from a requested output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutput {
    pub address: String,
    pub satoshis: u64,
    pub script: String,
    pub script_type: Option<ScriptType>,
}

/// Paymail resolution metadata attached to an output after processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymailMetadata {
    pub alias: String,
    pub domain: String,
    pub from_paymail: String,
    pub note: String,
    pub resolution_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_endpoint: Option<String>,
}

/// One requested output of a draft transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    /// Address, paymail or handle; empty for op_return outputs
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub satoshis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_return: Option<OpReturn>,
    /// Resolved locking scripts, filled by output processing
    #[serde(default)]
    pub scripts: Vec<ScriptOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymail: Option<PaymailMetadata>,
}

/// An input backing a draft, pairing the reserved utxo with the
/// destination its locking script belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub utxo: Utxo,
    pub destination: Destination,
}

/// Full configuration of a draft transaction, persisted as JSON on the
/// draft row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionConfig {
    #[serde(default)]
    pub outputs: Vec<TransactionOutput>,
    #[serde(default)]
    pub inputs: Vec<TransactionInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_unit: Option<FeeUnit>,
    #[serde(default)]
    pub fee: u64,
    /// Restrict input selection to these outpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_utxos: Option<Vec<UtxoPointer>>,
    /// Send every spendable satoshi to this single address/paymail
    #[serde(default)]
    pub send_all_to: String,
    #[serde(default)]
    pub change_satoshis: u64,
    #[serde(default)]
    pub change_destinations: Vec<Destination>,
    #[serde(default)]
    pub change_destinations_strategy: ChangeStrategy,
    #[serde(default)]
    pub change_minimum_satoshis: u64,
    #[serde(default)]
    pub change_number_of_destinations: u32,
    /// Per-draft expiry override, seconds
    #[serde(default)]
    pub expires_in_secs: u64,
}
