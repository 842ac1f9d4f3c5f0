use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::opcodes::OP_0;
use bitcoin::script::{Builder, PushBytesBuf};

use crate::domain::errors::WalletError;

/// Protocol prefix for MAP ("Magic Attribute Protocol") data outputs.
pub const MAP_PREFIX: &str = "1PuQa7K62MiKCtssSLKy1kh56WWU7MtUR5";
const MAP_SET: &str = "SET";
const MAP_APP_KEY: &str = "app";
const MAP_TYPE_KEY: &str = "type";

/// Build an `OP_FALSE OP_RETURN` locking script (hex) pushing each part as
/// its own data element.
pub fn build_data_script(parts: &[Vec<u8>]) -> Result<String, WalletError> {
    if parts.is_empty() {
        return Err(WalletError::InvalidOpReturnOutput(
            "no data parts given".to_string(),
        ));
    }
    let mut builder = Builder::new().push_opcode(OP_0).push_opcode(OP_RETURN);
    for part in parts {
        let push = PushBytesBuf::try_from(part.clone())
            .map_err(|e| WalletError::InvalidOpReturnOutput(e.to_string()))?;
        builder = builder.push_slice(push);
    }
    Ok(hex::encode(builder.into_script().as_bytes()))
}

/// Build a data script from hex-encoded parts.
pub fn build_from_hex_parts(hex_parts: &[String]) -> Result<String, WalletError> {
    let mut parts = Vec::with_capacity(hex_parts.len());
    for part in hex_parts {
        parts.push(
            hex::decode(part).map_err(|e| WalletError::InvalidOpReturnOutput(e.to_string()))?,
        );
    }
    build_data_script(&parts)
}

/// Build a data script from UTF-8 string parts.
pub fn build_from_string_parts(string_parts: &[String]) -> Result<String, WalletError> {
    let parts: Vec<Vec<u8>> = string_parts.iter().map(|s| s.as_bytes().to_vec()).collect();
    build_data_script(&parts)
}

/// Build a MAP protocol SET script: prefix, SET, app, type, then the
/// key/value pairs in key order.
pub fn build_map_script(
    app: &str,
    map_type: &str,
    keys: &std::collections::BTreeMap<String, String>,
) -> Result<String, WalletError> {
    let mut parts: Vec<String> = vec![
        MAP_PREFIX.to_string(),
        MAP_SET.to_string(),
        MAP_APP_KEY.to_string(),
        app.to_string(),
        MAP_TYPE_KEY.to_string(),
        map_type.to_string(),
    ];
    for (key, value) in keys {
        parts.push(key.clone());
        parts.push(value.clone());
    }
    build_from_string_parts(&parts)
}
