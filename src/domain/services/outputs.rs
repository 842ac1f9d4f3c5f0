use tracing::debug;

use crate::application::engine::Engine;
use crate::domain::errors::WalletError;
use crate::domain::models::{OpReturn, ScriptOutput, TransactionOutput};
use crate::infrastructure::paymail;
use crate::utils::op_return;
use crate::utils::scripts::{self, ScriptType};

/// Resolve one requested output into concrete locking scripts.
///
/// Accepted `to` forms: a plain address, `alias@domain` paymail, the
/// `$handle` and `1handle` shorthands, or empty with an `op_return`
/// payload attached.
pub async fn process_output(
    engine: &Engine,
    output: &mut TransactionOutput,
) -> Result<(), WalletError> {
    if let Some(payload) = output.op_return.clone() {
        if output.satoshis > 0 {
            return Err(WalletError::InvalidOpReturnOutput(
                "data outputs cannot carry satoshis".to_string(),
            ));
        }
        let script = build_op_return_script(&payload)?;
        output.scripts.push(ScriptOutput {
            address: String::new(),
            satoshis: 0,
            script,
            script_type: Some(ScriptType::NullData),
        });
        return Ok(());
    }

    if output.to.is_empty() {
        return Err(WalletError::MissingField("to"));
    }

    let to = expand_handle_shorthand(&output.to, engine);

    if to.contains('@') {
        return process_paymail_output(engine, output, &to).await;
    }

    // Plain address
    if output.satoshis < engine.config().dust_limit {
        return Err(WalletError::OutputValueTooLow);
    }
    let script = scripts::script_from_address(&to, engine.config().network)?;
    output.scripts.push(ScriptOutput {
        address: to,
        satoshis: output.satoshis,
        script_type: Some(scripts::script_type(&script)),
        script,
    });
    Ok(())
}

async fn process_paymail_output(
    engine: &Engine,
    output: &mut TransactionOutput,
    to: &str,
) -> Result<(), WalletError> {
    if output.satoshis < engine.config().dust_limit {
        return Err(WalletError::OutputValueTooLow);
    }
    let (alias, domain) = paymail::parse_paymail(to)?;

    let resolver = engine
        .paymail_resolver()
        .ok_or_else(|| WalletError::PaymailResolution("no resolver configured".to_string()))?;

    debug!(alias = %alias, domain = %domain, "resolving paymail output");
    let resolved = resolver
        .resolve(
            &alias,
            &domain,
            output.satoshis,
            &engine.config().default_from_paymail,
            &engine.config().default_note,
        )
        .await?;

    if resolved.scripts.is_empty() {
        return Err(WalletError::PaymailResolution(format!(
            "{}@{} resolved to no outputs",
            alias, domain
        )));
    }

    output.scripts.extend(resolved.scripts);
    output.paymail = Some(resolved.metadata);
    Ok(())
}

/// `$handle` pays handcash, `1handle` pays relayx; a `1...` string that
/// parses as an address on the configured network is left alone.
fn expand_handle_shorthand(to: &str, engine: &Engine) -> String {
    if let Some(handle) = to.strip_prefix('$') {
        if !handle.is_empty() {
            return format!("{}@handcash.io", handle);
        }
    } else if let Some(handle) = to.strip_prefix('1') {
        if !handle.is_empty() && !scripts::is_valid_address(to, engine.config().network) {
            return format!("{}@relayx.io", handle);
        }
    }
    to.to_string()
}

fn build_op_return_script(payload: &OpReturn) -> Result<String, WalletError> {
    if let Some(hex_script) = &payload.hex {
        // Whole script supplied as-is; just check it decodes
        hex::decode(hex_script).map_err(|e| WalletError::InvalidHex(e.to_string()))?;
        return Ok(hex_script.clone());
    }
    if let Some(parts) = &payload.hex_parts {
        if !parts.is_empty() {
            return op_return::build_from_hex_parts(parts);
        }
    }
    if let Some(parts) = &payload.string_parts {
        if !parts.is_empty() {
            return op_return::build_from_string_parts(parts);
        }
    }
    if let Some(map) = &payload.map {
        return op_return::build_map_script(&map.app, &map.map_type, &map.keys);
    }
    Err(WalletError::InvalidOpReturnOutput(
        "no data supplied".to_string(),
    ))
}
