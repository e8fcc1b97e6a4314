//! Saga error types.

use booking::StoreError;
use thiserror::Error;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A booking or payment does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller does not own the booking.
    #[error("Booking {booking_id} does not belong to user {user_id}")]
    Forbidden { booking_id: String, user_id: String },

    /// The booking or payment is not in the status the operation needs.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A malformed or missing identifier or payload.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A repository call failed.
    #[error("Failed to {context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The notification collaborator rejected a message.
    #[error("Notification error: {0}")]
    Notification(String),
}

/// Coarse classification of a [`SagaError`] for boundary layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    BadRequest,
    Internal,
}

impl ErrorKind {
    /// Returns the HTTP-equivalent status code.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Forbidden => 403,
            ErrorKind::Conflict => 409,
            ErrorKind::BadRequest => 400,
            ErrorKind::Internal => 500,
        }
    }
}

impl SagaError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::NotFound { .. } => ErrorKind::NotFound,
            SagaError::Forbidden { .. } => ErrorKind::Forbidden,
            SagaError::Conflict(_) => ErrorKind::Conflict,
            SagaError::BadRequest(_) => ErrorKind::BadRequest,
            SagaError::Store { source, .. } => match source {
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                StoreError::StatusConflict { .. } | StoreError::DuplicateIdempotencyKey(_) => {
                    ErrorKind::Conflict
                }
                _ => ErrorKind::Internal,
            },
            SagaError::Serialization(_) | SagaError::Notification(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        SagaError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Attaches the failed step to a repository error.
pub(crate) trait StoreContext<T> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T> StoreContext<T> for std::result::Result<T, StoreError> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|source| SagaError::Store { context, source })
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_keep_their_kind() {
        let missing: std::result::Result<(), _> = Err(StoreError::NotFound {
            entity: "Booking",
            id: "1".to_string(),
        });
        let err = missing.context("load booking").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Failed to load booking: Booking not found: 1");

        let dup = SagaError::Store {
            context: "create payment",
            source: StoreError::DuplicateIdempotencyKey("checkout:1:u".to_string()),
        };
        assert_eq!(dup.kind(), ErrorKind::Conflict);

        let down = SagaError::Store {
            context: "update booking",
            source: StoreError::Unavailable("gone".to_string()),
        };
        assert_eq!(down.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::Forbidden.http_status(), 403);
        assert_eq!(ErrorKind::Conflict.http_status(), 409);
        assert_eq!(ErrorKind::BadRequest.http_status(), 400);
        assert_eq!(ErrorKind::Internal.http_status(), 500);
    }
}
