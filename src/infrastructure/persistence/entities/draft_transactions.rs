use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "draft_transactions")]
pub struct Model {
    /// Random 32-byte hex id
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    #[sea_orm(column_type = "Text")]
    pub xpub_id: String,
    /// draft | complete | expired | canceled
    #[sea_orm(column_type = "Text")]
    pub status: String,
    /// Requested outputs, fee policy and change policy as JSON
    pub configuration: Json,
    pub expires_at: DateTimeUtc,
    /// Unsigned transaction hex
    #[sea_orm(column_type = "Text")]
    pub hex: String,
    /// Id of the recorded transaction that completed this draft
    #[sea_orm(column_type = "Text", nullable)]
    pub final_tx_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
