use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{NewOutboxEvent, OutboxEvent, OutboxEventId, Result};

/// Durable table of domain events awaiting delivery.
///
/// All implementations must be thread-safe (Send + Sync). The store is an
/// externally synchronized resource; callers never cache its rows.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Persists a new event with `retry_count = 0` and no publish time.
    async fn create_event(&self, event: NewOutboxEvent) -> Result<OutboxEvent>;

    /// Returns up to `limit` events whose `published_at` is unset, oldest first.
    async fn list_unpublished(&self, limit: usize) -> Result<Vec<OutboxEvent>>;

    /// Records that the event reached a broker.
    async fn mark_published(&self, id: OutboxEventId, at: DateTime<Utc>) -> Result<()>;

    /// Counts one more failed publish attempt.
    async fn increment_retry(&self, id: OutboxEventId) -> Result<()>;

    /// Loads a single event.
    async fn get_event(&self, id: OutboxEventId) -> Result<Option<OutboxEvent>>;
}
