use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::infrastructure::persistence::entities::access_keys;
use crate::infrastructure::persistence::error::DbError;

/// Repository for access key operations
#[derive(Clone, Default)]
pub struct AccessKeyRepository;

impl AccessKeyRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_by_id<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &str,
    ) -> Result<Option<access_keys::Model>, DbError> {
        let result = access_keys::Entity::find_by_id(id).one(db).await?;
        Ok(result)
    }

    pub async fn get_by_xpub_id<C: ConnectionTrait>(
        &self,
        db: &C,
        xpub_id: &str,
    ) -> Result<Vec<access_keys::Model>, DbError> {
        let result = access_keys::Entity::find()
            .filter(access_keys::Column::XpubId.eq(xpub_id))
            .order_by_asc(access_keys::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(result)
    }
}
