//! Repository error types.

use outbox::OutboxError;
use thiserror::Error;

/// Errors returned by booking, payment and inventory repositories.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A status compare-and-set failed, or a terminal status would be left.
    #[error("{entity} {id} is in status {status}")]
    StatusConflict {
        entity: &'static str,
        id: String,
        status: String,
    },

    /// A payment with the same idempotency key already exists.
    #[error("Duplicate idempotency key: {0}")]
    DuplicateIdempotencyKey(String),

    /// Not enough inventory to reserve a night.
    #[error("No availability for room {room_id} on {night}")]
    SoldOut { room_id: String, night: String },

    /// A stored value could not be decoded.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// The backing store rejected the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Writing the outbox record failed.
    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn status_conflict(
        entity: &'static str,
        id: impl ToString,
        status: impl ToString,
    ) -> Self {
        StoreError::StatusConflict {
            entity,
            id: id.to_string(),
            status: status.to_string(),
        }
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StoreError>;
