/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Event already exists: {0}")]
    EventConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Row decode error: {0}")]
    Decode(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Postgres unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

impl StoreError {
    /// True when the underlying failure is a unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some(UNIQUE_VIOLATION)
            }
            _ => false,
        }
    }
}
