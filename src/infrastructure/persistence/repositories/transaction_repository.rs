use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::infrastructure::persistence::entities::transactions;
use crate::infrastructure::persistence::error::DbError;

/// Repository for recorded transaction operations
#[derive(Clone, Default)]
pub struct TransactionRepository;

impl TransactionRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_by_id<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &str,
    ) -> Result<Option<transactions::Model>, DbError> {
        let result = transactions::Entity::find_by_id(id).one(db).await?;
        Ok(result)
    }

    pub async fn get_by_draft_id<C: ConnectionTrait>(
        &self,
        db: &C,
        draft_id: &str,
    ) -> Result<Option<transactions::Model>, DbError> {
        let result = transactions::Entity::find()
            .filter(transactions::Column::DraftId.eq(draft_id))
            .one(db)
            .await?;
        Ok(result)
    }

    /// Transactions that touched an account on either side, newest first.
    pub async fn list_for_xpub<C: ConnectionTrait>(
        &self,
        db: &C,
        xpub_id: &str,
    ) -> Result<Vec<transactions::Model>, DbError> {
        let pattern = format!("%\"{}\"%", xpub_id);
        let result = transactions::Entity::find()
            .filter(
                transactions::Column::XpubInIds
                    .like(&pattern)
                    .or(transactions::Column::XpubOutIds.like(&pattern)),
            )
            .order_by_desc(transactions::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(result)
    }
}
