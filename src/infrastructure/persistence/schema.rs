use sea_orm::{ConnectionTrait, DatabaseConnection, Schema};

use crate::infrastructure::persistence::entities;
use crate::infrastructure::persistence::error::DbError;

/// Create every table the engine uses, skipping ones that already exist.
/// Production deployments run migrations out of band; this is used to
/// bootstrap ephemeral databases (`sqlite::memory:` in tests and demos).
pub async fn create_all_tables(conn: &DatabaseConnection) -> Result<(), DbError> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let statements = vec![
        schema.create_table_from_entity(entities::xpubs::Entity),
        schema.create_table_from_entity(entities::destinations::Entity),
        schema.create_table_from_entity(entities::utxos::Entity),
        schema.create_table_from_entity(entities::draft_transactions::Entity),
        schema.create_table_from_entity(entities::transactions::Entity),
        schema.create_table_from_entity(entities::access_keys::Entity),
    ];

    for mut statement in statements {
        statement.if_not_exists();
        conn.execute(backend.build(&statement)).await?;
    }

    Ok(())
}
