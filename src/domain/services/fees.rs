use crate::domain::models::{FeeUnit, TransactionConfig};
use crate::utils::scripts::ScriptType;

/// Fixed byte cost of version, locktime and the count prefixes.
pub const TX_OVERHEAD_SIZE: u64 = 10;
/// A signed p2pkh input: outpoint, script sig with signature and pubkey,
/// sequence.
pub const P2PKH_INPUT_SIZE: u64 = 148;
/// Conservative estimate for inputs whose unlocking cost is unknown.
pub const UNKNOWN_INPUT_SIZE: u64 = 500;
/// Per-output cost on top of the locking script: value and script length.
pub const OUTPUT_BASE_SIZE: u64 = 9;
/// Conservative estimate for outputs whose script cannot be decoded.
pub const UNKNOWN_OUTPUT_SIZE: u64 = 500;

/// Estimated byte size of the signed transaction this configuration will
/// become. Unknown shapes are overestimated, never underestimated.
pub fn estimate_size(config: &TransactionConfig) -> u64 {
    let mut size = TX_OVERHEAD_SIZE;

    for input in &config.inputs {
        size += match input.utxo.script_type {
            ScriptType::PubKeyHash => P2PKH_INPUT_SIZE,
            _ => UNKNOWN_INPUT_SIZE,
        };
    }

    for output in &config.outputs {
        for script in &output.scripts {
            size += match hex::decode(&script.script) {
                Ok(bytes) => bytes.len() as u64 + OUTPUT_BASE_SIZE,
                Err(_) => UNKNOWN_OUTPUT_SIZE,
            };
        }
    }

    size
}

/// Fee for the estimated size under the given unit, rounded up.
pub fn estimate_fee(unit: FeeUnit, config: &TransactionConfig) -> u64 {
    fee_for_size(unit, estimate_size(config))
}

pub fn fee_for_size(unit: FeeUnit, size: u64) -> u64 {
    (size as f64 * unit.rate()).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        Destination, ScriptOutput, TransactionInput, TransactionOutput, Utxo,
    };

    const P2PKH_SCRIPT: &str = "76a9147ff514e6ae3deb46e6644caac5cdd0bf2388906588ac";

    fn config_with(inputs: usize, outputs: usize) -> TransactionConfig {
        let utxo = Utxo::new("aa", 0, "xpub-id", 1000, P2PKH_SCRIPT);
        let destination = Destination::new("xpub-id", P2PKH_SCRIPT, 0, 0, "addr");
        TransactionConfig {
            inputs: (0..inputs)
                .map(|_| TransactionInput {
                    utxo: utxo.clone(),
                    destination: destination.clone(),
                })
                .collect(),
            outputs: (0..outputs)
                .map(|_| TransactionOutput {
                    scripts: vec![ScriptOutput {
                        script: P2PKH_SCRIPT.to_string(),
                        satoshis: 1000,
                        ..Default::default()
                    }],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn size_of_one_in_one_out() {
        // 10 overhead + 148 input + (25 script + 9) output
        assert_eq!(estimate_size(&config_with(1, 1)), 192);
    }

    #[test]
    fn fee_rounds_up() {
        let unit = FeeUnit {
            satoshis: 500,
            bytes: 1000,
        };
        assert_eq!(fee_for_size(unit, 192), 96);
        assert_eq!(fee_for_size(unit, 193), 97);

        let unit = FeeUnit {
            satoshis: 1000,
            bytes: 1000,
        };
        assert_eq!(fee_for_size(unit, 192), 192);
    }

    #[test]
    fn unknown_output_script_is_overestimated() {
        let mut config = config_with(0, 1);
        config.outputs[0].scripts[0].script = "not-hex".to_string();
        assert_eq!(estimate_size(&config), TX_OVERHEAD_SIZE + UNKNOWN_OUTPUT_SIZE);
    }
}
