use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "destinations")]
pub struct Model {
    /// sha256 of the locking script
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    #[sea_orm(column_type = "Text")]
    pub xpub_id: String,
    #[sea_orm(column_type = "Text")]
    pub locking_script: String,
    /// Locking script type (pubkeyhash, nulldata, ...)
    #[sea_orm(column_type = "Text")]
    pub script_type: String,
    /// Derivation branch: 0 external, 1 internal
    pub chain: i32,
    /// Index on that branch
    pub num: i32,
    #[sea_orm(column_type = "Text")]
    pub address: String,
    /// Set when the destination was created as draft change
    #[sea_orm(column_type = "Text", nullable)]
    pub draft_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
    pub metadata: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
