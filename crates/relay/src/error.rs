//! Relay error types.

use booking::StoreError;
use metrics_exporter_prometheus::BuildError;
use saga::SagaError;
use thiserror::Error;

/// Errors that stop the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The Prometheus exporter could not be installed.
    #[error("Metrics exporter error: {0}")]
    Metrics(#[from] BuildError),

    /// Seeding the demo booking failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The demo checkout failed.
    #[error("Saga error: {0}")]
    Saga(#[from] SagaError),

    /// A background task panicked or was aborted.
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Convenience type alias for relay results.
pub type Result<T> = std::result::Result<T, RelayError>;
