use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::infrastructure::persistence::entities::destinations;
use crate::infrastructure::persistence::error::DbError;
use crate::utils;

/// Repository for destination (derived output script) operations
#[derive(Clone, Default)]
pub struct DestinationRepository;

impl DestinationRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_by_id<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &str,
    ) -> Result<Option<destinations::Model>, DbError> {
        let result = destinations::Entity::find_by_id(id).one(db).await?;
        Ok(result)
    }

    /// The destination id is derived from the script, so this is a primary
    /// key lookup in disguise.
    pub async fn get_by_locking_script<C: ConnectionTrait>(
        &self,
        db: &C,
        locking_script: &str,
    ) -> Result<Option<destinations::Model>, DbError> {
        self.get_by_id(db, &utils::hash(locking_script)).await
    }

    pub async fn get_by_address<C: ConnectionTrait>(
        &self,
        db: &C,
        address: &str,
    ) -> Result<Option<destinations::Model>, DbError> {
        let result = destinations::Entity::find()
            .filter(destinations::Column::Address.eq(address))
            .one(db)
            .await?;
        Ok(result)
    }

    pub async fn get_by_xpub_id<C: ConnectionTrait>(
        &self,
        db: &C,
        xpub_id: &str,
    ) -> Result<Vec<destinations::Model>, DbError> {
        let result = destinations::Entity::find()
            .filter(destinations::Column::XpubId.eq(xpub_id))
            .order_by_asc(destinations::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(result)
    }
}
