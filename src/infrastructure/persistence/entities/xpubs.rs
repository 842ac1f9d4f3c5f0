use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "xpubs")]
pub struct Model {
    /// sha256 of the raw extended public key
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    /// Current balance of unspent satoshis, mutated only via atomic increments
    pub current_balance: i64,
    /// Next index on the internal (change) derivation branch
    pub next_internal_num: i64,
    /// Next index on the external (receive) derivation branch
    pub next_external_num: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
    pub metadata: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
