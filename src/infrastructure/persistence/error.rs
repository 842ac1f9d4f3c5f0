use thiserror::Error;

/// Error type for database connection and query operations
#[derive(Debug, Error)]
pub enum DbError {
    /// Error occurred during a connection attempt
    #[error("database connection error: {0}")]
    ConnectionError(String),

    /// Error occurred during query execution
    #[error("database query error: {0}")]
    QueryError(String),

    /// A row violated a uniqueness constraint (duplicate insert)
    #[error("database conflict: {0}")]
    Conflict(String),
}

impl From<sea_orm::DbErr> for DbError {
    fn from(err: sea_orm::DbErr) -> Self {
        let msg = err.to_string();
        // sea-orm surfaces unique-constraint violations as plain query
        // errors with backend-specific wording; detect the common ones so
        // callers can branch on duplicate inserts.
        if msg.contains("UNIQUE constraint failed")
            || msg.contains("duplicate key value")
            || msg.contains("Duplicate entry")
        {
            DbError::Conflict(msg)
        } else {
            DbError::QueryError(msg)
        }
    }
}

impl DbError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }
}
