use async_trait::async_trait;

use crate::domain::errors::WalletError;
use crate::domain::models::{PaymailMetadata, ScriptOutput};

/// Outcome of resolving a paymail handle into payable scripts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedPaymail {
    pub scripts: Vec<ScriptOutput>,
    pub metadata: PaymailMetadata,
}

/// Resolves `alias@domain` handles to locking scripts, either via basic
/// address resolution or a p2p payment destination request.
#[async_trait]
pub trait PaymailResolver: Send + Sync {
    async fn resolve(
        &self,
        alias: &str,
        domain: &str,
        satoshis: u64,
        from_paymail: &str,
        note: &str,
    ) -> Result<ResolvedPaymail, WalletError>;
}

/// Split and validate an `alias@domain` handle.
pub fn parse_paymail(to: &str) -> Result<(String, String), WalletError> {
    let (alias, domain) = to
        .split_once('@')
        .ok_or(WalletError::PaymailAddressIsInvalid)?;
    let alias = alias.trim().to_lowercase();
    let domain = domain.trim().to_lowercase();
    if alias.is_empty() || domain.is_empty() || !domain.contains('.') || domain.contains('@') {
        return Err(WalletError::PaymailAddressIsInvalid);
    }
    Ok((alias, domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_plain_handle() {
        let (alias, domain) = parse_paymail("Somebody@Example.com").unwrap();
        assert_eq!(alias, "somebody");
        assert_eq!(domain, "example.com");
    }

    #[test]
    fn rejects_malformed_handles() {
        for bad in ["plain", "@example.com", "user@", "user@nodot", "a@b@c.com"] {
            assert!(
                matches!(parse_paymail(bad), Err(WalletError::PaymailAddressIsInvalid)),
                "expected rejection of {}",
                bad
            );
        }
    }
}
