use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbBackend, EntityTrait, Set, Statement, Unchanged,
};

use crate::infrastructure::persistence::entities::xpubs;
use crate::infrastructure::persistence::error::DbError;

/// Derivation branch selector for [`XpubRepository::increment_next_num`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationBranch {
    External,
    Internal,
}

/// Repository for xpub account operations. Methods run against whatever
/// connection the caller passes, so hooks can use the open transaction
/// and everything else the shared pool.
#[derive(Clone, Default)]
pub struct XpubRepository;

impl XpubRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_by_id<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &str,
    ) -> Result<Option<xpubs::Model>, DbError> {
        let result = xpubs::Entity::find_by_id(id).one(db).await?;
        Ok(result)
    }

    /// Atomically add `delta` satoshis to the account balance and return
    /// the new balance. One UPDATE with a RETURNING clause, so concurrent
    /// writers can neither lose an increment nor observe each other's.
    pub async fn increment_balance<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &str,
        delta: i64,
    ) -> Result<i64, DbError> {
        let row = db
            .query_one(increment_statement(
                db.get_database_backend(),
                "current_balance",
                delta,
                id,
            ))
            .await?
            .ok_or_else(|| DbError::QueryError(format!("xpub {} not found", id)))?;
        let balance: i64 = row
            .try_get("", "current_balance")
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(balance)
    }

    /// Atomically advance the next derivation index on the given branch
    /// and return the index that was claimed (the value before the
    /// increment). Increment and read happen in the same statement, so
    /// two concurrent callers always claim distinct indices.
    pub async fn increment_next_num<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &str,
        branch: DerivationBranch,
    ) -> Result<u32, DbError> {
        let column = match branch {
            DerivationBranch::External => "next_external_num",
            DerivationBranch::Internal => "next_internal_num",
        };

        let row = db
            .query_one(increment_statement(db.get_database_backend(), column, 1, id))
            .await?
            .ok_or_else(|| DbError::QueryError(format!("xpub {} not found", id)))?;
        let new_value: i64 = row
            .try_get("", column)
            .map_err(|e| DbError::QueryError(e.to_string()))?;

        Ok((new_value - 1).max(0) as u32)
    }

    /// Persist updated metadata without touching the counters.
    pub async fn update_metadata<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), DbError> {
        let model = xpubs::ActiveModel {
            id: Unchanged(id.to_string()),
            metadata: Set(metadata),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        model.update(db).await?;
        Ok(())
    }
}

// UPDATE ... RETURNING keeps the increment and the read of the new value
// in one statement. Supported by both backends the engine connects to
// (Postgres, and SQLite since 3.35).
fn increment_statement(backend: DbBackend, column: &str, delta: i64, id: &str) -> Statement {
    let sql = match backend {
        DbBackend::Postgres => format!(
            "UPDATE xpubs SET {col} = {col} + $1, updated_at = $2 WHERE id = $3 RETURNING {col}",
            col = column
        ),
        _ => format!(
            "UPDATE xpubs SET {col} = {col} + ?, updated_at = ? WHERE id = ? RETURNING {col}",
            col = column
        ),
    };
    Statement::from_sql_and_values(backend, sql, [delta.into(), Utc::now().into(), id.into()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_statement_targets_the_requested_column() {
        let stmt = increment_statement(DbBackend::Sqlite, "next_internal_num", 1, "abc");
        assert!(stmt.sql.contains("next_internal_num = next_internal_num + ?"));
        assert!(stmt.sql.contains("RETURNING next_internal_num"));

        let stmt = increment_statement(DbBackend::Postgres, "current_balance", -50, "abc");
        assert!(stmt.sql.contains("current_balance = current_balance + $1"));
        assert!(stmt.sql.contains("RETURNING current_balance"));
    }
}
