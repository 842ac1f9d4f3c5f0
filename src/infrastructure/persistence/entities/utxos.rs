use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "utxos")]
pub struct Model {
    /// sha256 of "{transaction_id}|{output_index}"
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    #[sea_orm(column_type = "Text")]
    pub transaction_id: String,
    pub output_index: i32,
    #[sea_orm(column_type = "Text")]
    pub xpub_id: String,
    pub satoshis: i64,
    #[sea_orm(column_type = "Text")]
    pub script_pub_key: String,
    #[sea_orm(column_type = "Text")]
    pub script_type: String,
    /// Reservation state: both set while a draft holds this output
    #[sea_orm(column_type = "Text", nullable)]
    pub draft_id: Option<String>,
    pub reserved_at: Option<DateTimeUtc>,
    /// Terminal state: set once the output has been spent
    #[sea_orm(column_type = "Text", nullable)]
    pub spending_tx_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
