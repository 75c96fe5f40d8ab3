use common::EntityId;
use thiserror::Error;

/// Errors that can occur when interacting with identity storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A write collided with a uniqueness constraint.
    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    /// The session failed to commit.
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// The unit of work has no open scope.
    #[error("No active unit of work scope")]
    NoActiveScope,

    /// An id is already tracked as a different kind of entity.
    #[error("Entity {id} is tracked as a {found}, not a {expected}")]
    KindMismatch {
        id: EntityId,
        expected: &'static str,
        found: &'static str,
    },
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
