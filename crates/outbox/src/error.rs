use thiserror::Error;

use crate::OutboxEventId;

/// Errors that can occur when interacting with the outbox.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// The outbox record does not exist.
    #[error("Outbox event not found: {0}")]
    EventNotFound(OutboxEventId),

    /// The backing store rejected the operation.
    #[error("Outbox store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Publishing to the broker failed.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The relay loop was asked to stop.
    #[error("Outbox worker cancelled")]
    Cancelled,
}

/// Errors returned by a [`crate::MessagePublisher`].
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// The broker refused or failed to accept the message.
    #[error("Publish to {exchange}/{routing_key} failed: {reason}")]
    Rejected {
        exchange: String,
        routing_key: String,
        reason: String,
    },

    /// The connection or channel to the broker is gone.
    #[error("Broker connection closed")]
    Closed,
}

/// Result type for outbox operations.
pub type Result<T> = std::result::Result<T, OutboxError>;
