use std::fmt;
use std::str::FromStr;

use bitcoin::{Address, Network, ScriptBuf};
use serde::{Deserialize, Serialize};

use crate::domain::errors::WalletError;

/// Recognized locking-script types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    PubKeyHash,
    NullData,
    ScriptHash,
    NonStandard,
}

impl ScriptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::PubKeyHash => "pubkeyhash",
            ScriptType::NullData => "nulldata",
            ScriptType::ScriptHash => "scripthash",
            ScriptType::NonStandard => "nonstandard",
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pubkeyhash" => Ok(ScriptType::PubKeyHash),
            "nulldata" => Ok(ScriptType::NullData),
            "scripthash" => Ok(ScriptType::ScriptHash),
            "nonstandard" => Ok(ScriptType::NonStandard),
            other => Err(WalletError::UnsupportedDestinationType(other.to_string())),
        }
    }
}

/// Parse a hex locking script.
pub fn script_from_hex(script_hex: &str) -> Result<ScriptBuf, WalletError> {
    let bytes =
        hex::decode(script_hex).map_err(|e| WalletError::InvalidLockingScript(e.to_string()))?;
    Ok(ScriptBuf::from(bytes))
}

/// Classify a hex locking script into a [`ScriptType`].
///
/// Data outputs come in two shapes: `OP_RETURN ...` and the
/// `OP_FALSE OP_RETURN ...` form, so both are treated as nulldata.
pub fn script_type(script_hex: &str) -> ScriptType {
    let script = match script_from_hex(script_hex) {
        Ok(s) => s,
        Err(_) => return ScriptType::NonStandard,
    };
    let bytes = script.as_bytes();
    if script.is_p2pkh() {
        ScriptType::PubKeyHash
    } else if script.is_op_return() || bytes.starts_with(&[0x00, 0x6a]) {
        ScriptType::NullData
    } else if script.is_p2sh() {
        ScriptType::ScriptHash
    } else {
        ScriptType::NonStandard
    }
}

/// Locking script (hex) for a legacy address.
pub fn script_from_address(address: &str, network: Network) -> Result<String, WalletError> {
    let addr = Address::from_str(address)
        .map_err(|e| WalletError::InvalidAddress(e.to_string()))?
        .require_network(network)
        .map_err(|e| WalletError::InvalidAddress(e.to_string()))?;
    Ok(hex::encode(addr.script_pubkey().as_bytes()))
}

/// Extract the address encoded by a hex locking script, if any.
pub fn address_from_script(script_hex: &str, network: Network) -> Option<String> {
    let script = script_from_hex(script_hex).ok()?;
    Address::from_script(&script, network)
        .ok()
        .map(|a| a.to_string())
}

/// Check whether a string parses as a valid address on the given network.
pub fn is_valid_address(address: &str, network: Network) -> bool {
    Address::from_str(address)
        .ok()
        .and_then(|a| a.require_network(network).ok())
        .is_some()
}
