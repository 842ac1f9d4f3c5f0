use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::infrastructure::persistence::entities::draft_transactions;
use crate::infrastructure::persistence::error::DbError;

/// Repository for draft transaction operations
#[derive(Clone, Default)]
pub struct DraftTransactionRepository;

impl DraftTransactionRepository {
    pub fn new() -> Self {
        Self
    }

    /// Drafts are always fetched in the context of their owner, so the
    /// lookup is scoped by xpub id as well as draft id.
    pub async fn get<C: ConnectionTrait>(
        &self,
        db: &C,
        xpub_id: &str,
        id: &str,
    ) -> Result<Option<draft_transactions::Model>, DbError> {
        let result = draft_transactions::Entity::find()
            .filter(draft_transactions::Column::Id.eq(id))
            .filter(draft_transactions::Column::XpubId.eq(xpub_id))
            .one(db)
            .await?;
        Ok(result)
    }

    pub async fn get_by_id<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &str,
    ) -> Result<Option<draft_transactions::Model>, DbError> {
        let result = draft_transactions::Entity::find_by_id(id).one(db).await?;
        Ok(result)
    }

    /// Pending drafts whose expiry has passed, oldest first. Driven by the
    /// cleanup task, which expires them through the save pipeline so their
    /// reservations get released.
    pub async fn list_expired<C: ConnectionTrait>(
        &self,
        db: &C,
        now: DateTime<Utc>,
    ) -> Result<Vec<draft_transactions::Model>, DbError> {
        let result = draft_transactions::Entity::find()
            .filter(draft_transactions::Column::Status.eq("draft"))
            .filter(draft_transactions::Column::ExpiresAt.lte(now))
            .order_by_asc(draft_transactions::Column::ExpiresAt)
            .all(db)
            .await?;
        Ok(result)
    }
}
