use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};

use bitcoin::secp256k1::{Secp256k1, SecretKey};

use crate::application::engine::Engine;
use crate::domain::errors::WalletError;
use crate::domain::models::ModelState;
use crate::infrastructure::persistence::entities::access_keys;
use crate::infrastructure::persistence::orchestrator::Persistable;
use crate::infrastructure::persistence::DbError;
use crate::utils;

/// A secondary signing credential scoped to one xpub. The private key is
/// generated server side, handed out exactly once on creation and never
/// stored; only the hash of the public key is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessKey {
    pub id: String,
    pub xpub_id: String,
    /// Hex private key, only present right after creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    #[serde(skip)]
    pub(crate) state: ModelState,
}

impl AccessKey {
    /// Generate a fresh key pair for the account.
    pub fn new(xpub_id: &str) -> Self {
        let secp = Secp256k1::new();
        let secret_key = random_secret_key();
        let public_key = secret_key.public_key(&secp);

        Self {
            id: utils::hash(&hex::encode(public_key.serialize())),
            xpub_id: xpub_id.to_string(),
            key: Some(hex::encode(secret_key.secret_bytes())),
            revoked_at: None,
            created_at: Utc::now(),
            updated_at: None,
            metadata: None,
            state: ModelState::new_record(),
        }
    }

    pub(crate) fn from_entity(m: access_keys::Model) -> Self {
        Self {
            id: m.id,
            xpub_id: m.xpub_id,
            key: None,
            revoked_at: m.revoked_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
            metadata: m.metadata,
            state: ModelState::existing(),
        }
    }

    fn to_active_model(&self) -> access_keys::ActiveModel {
        access_keys::ActiveModel {
            id: Set(self.id.clone()),
            xpub_id: Set(self.xpub_id.clone()),
            revoked_at: Set(self.revoked_at),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
            metadata: Set(self.metadata.clone()),
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Mark the key revoked. The transition is one way.
    pub fn revoke(&mut self) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(Utc::now());
        }
    }
}

fn random_secret_key() -> SecretKey {
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; 32];
    loop {
        rng.fill_bytes(&mut bytes);
        if let Ok(key) = SecretKey::from_slice(&bytes) {
            return key;
        }
    }
}

#[async_trait]
impl Persistable for AccessKey {
    fn model_name(&self) -> &'static str {
        "access_key"
    }

    fn record_id(&self) -> String {
        self.id.clone()
    }

    fn is_new(&self) -> bool {
        self.state.is_new()
    }

    fn mark_not_new(&mut self) {
        self.state.mark_not_new();
    }

    fn stamp(&mut self, created: bool, at: DateTime<Utc>) {
        if created {
            self.created_at = at;
        } else {
            self.updated_at = Some(at);
        }
    }

    async fn before_creating(
        &mut self,
        _engine: &Engine,
        _txn: &DatabaseTransaction,
    ) -> Result<(), WalletError> {
        if self.xpub_id.is_empty() {
            return Err(WalletError::MissingField("xpub_id"));
        }
        Ok(())
    }

    async fn persist(&self, txn: &DatabaseTransaction) -> Result<(), DbError> {
        let model = self.to_active_model();
        if self.is_new() {
            model.insert(txn).await?;
        } else {
            model.update(txn).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::PublicKey;
    use std::str::FromStr;

    #[test]
    fn id_matches_generated_public_key() {
        let access_key = AccessKey::new("xpub-id");
        let secp = Secp256k1::new();
        let secret =
            SecretKey::from_str(access_key.key.as_deref().unwrap()).unwrap();
        let public = PublicKey::from_secret_key(&secp, &secret);
        assert_eq!(access_key.id, utils::hash(&hex::encode(public.serialize())));
        assert!(!access_key.is_revoked());
    }

    #[test]
    fn revoke_is_one_way() {
        let mut access_key = AccessKey::new("xpub-id");
        access_key.revoke();
        let first = access_key.revoked_at;
        access_key.revoke();
        assert_eq!(access_key.revoked_at, first);
    }
}
