use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    NewOutboxEvent, OutboxError, OutboxEvent, OutboxEventId, Result, store::OutboxStore,
};

/// In-memory outbox store for testing and single-process runs.
///
/// Provides the same interface as the PostgreSQL implementation, plus
/// switches for injecting write failures.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    events: Arc<RwLock<Vec<OutboxEvent>>>,
    fail_on_create: Arc<AtomicBool>,
    fail_on_mark_published: Arc<AtomicBool>,
}

impl InMemoryOutboxStore {
    /// Creates a new empty in-memory outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `create_event` calls fail.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `mark_published` calls fail.
    pub fn set_fail_on_mark_published(&self, fail: bool) {
        self.fail_on_mark_published.store(fail, Ordering::SeqCst);
    }

    /// Returns true if the next `create_event` call is set up to fail.
    pub fn will_fail_on_create(&self) -> bool {
        self.fail_on_create.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of every stored event, in insertion order.
    pub async fn events(&self) -> Vec<OutboxEvent> {
        self.events.read().await.clone()
    }

    /// Returns the stored events of one type.
    pub async fn events_of_type(&self, event_type: &str) -> Vec<OutboxEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn create_event(&self, event: NewOutboxEvent) -> Result<OutboxEvent> {
        if self.will_fail_on_create() {
            return Err(OutboxError::Unavailable(
                "outbox insert rejected".to_string(),
            ));
        }

        let record = OutboxEvent::from_new(event);
        self.events.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_unpublished(&self, limit: usize) -> Result<Vec<OutboxEvent>> {
        let events = self.events.read().await;
        let mut pending: Vec<_> = events
            .iter()
            .filter(|e| !e.is_published())
            .cloned()
            .collect();
        pending.sort_by_key(|e| e.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_published(&self, id: OutboxEventId, at: DateTime<Utc>) -> Result<()> {
        if self.fail_on_mark_published.load(Ordering::SeqCst) {
            return Err(OutboxError::Unavailable(
                "outbox update rejected".to_string(),
            ));
        }

        let mut events = self.events.write().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(OutboxError::EventNotFound(id))?;
        event.published_at = Some(at);
        Ok(())
    }

    async fn increment_retry(&self, id: OutboxEventId) -> Result<()> {
        let mut events = self.events.write().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(OutboxError::EventNotFound(id))?;
        event.retry_count += 1;
        Ok(())
    }

    async fn get_event(&self, id: OutboxEventId) -> Result<Option<OutboxEvent>> {
        let events = self.events.read().await;
        Ok(events.iter().find(|e| e.id == id).cloned())
    }
}
