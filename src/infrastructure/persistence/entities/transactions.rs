use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Canonical transaction id (hash of the hex)
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    #[sea_orm(column_type = "Text")]
    pub hex: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub draft_id: Option<String>,
    pub fee: i64,
    pub total_value: i64,
    pub number_of_inputs: i32,
    pub number_of_outputs: i32,
    /// Owners touched on the input side (JSON array of xpub ids)
    pub xpub_in_ids: Json,
    /// Owners touched on the output side (JSON array of xpub ids)
    pub xpub_out_ids: Json,
    /// Signed satoshi delta per owner (JSON map xpub_id -> i64)
    pub xpub_output_value: Json,
    #[sea_orm(column_type = "Text", nullable)]
    pub block_hash: Option<String>,
    pub block_height: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
