use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl DatabaseError {
    /// True for unique-constraint violations surfaced by the backend.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }
}
