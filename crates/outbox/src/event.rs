use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OutboxEventId;

/// A pending or delivered outbox record.
///
/// Records are created alongside the state change they describe and are only
/// mutated by the relay worker: `retry_count` grows on failed publishes and
/// `published_at` is set once the event reaches the primary or dead-letter
/// exchange. Records are never deleted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEvent {
    /// Unique identifier for this record.
    pub id: OutboxEventId,

    /// The type of aggregate the event describes (e.g., "Payment").
    pub aggregate_type: String,

    /// Identifier of the aggregate instance.
    pub aggregate_id: String,

    /// Event type tag, used to pick the routing key.
    pub event_type: String,

    /// Serialized event body, opaque to the outbox.
    pub payload: Vec<u8>,

    /// Number of failed publish attempts.
    pub retry_count: i32,

    /// When the record was written.
    pub created_at: DateTime<Utc>,

    /// When the record was delivered (or dead-lettered).
    pub published_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    /// Returns true once the event has been handed to a broker.
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    /// Materializes a new record from its insert form.
    pub fn from_new(event: NewOutboxEvent) -> Self {
        Self {
            id: event.id,
            aggregate_type: event.aggregate_type,
            aggregate_id: event.aggregate_id,
            event_type: event.event_type,
            payload: event.payload,
            retry_count: 0,
            created_at: event.created_at,
            published_at: None,
        }
    }
}

/// An outbox record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutboxEvent {
    pub id: OutboxEventId,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl NewOutboxEvent {
    /// Creates an event whose payload is the JSON encoding of `payload`.
    pub fn json<T: Serialize>(
        aggregate_type: impl Into<String>,
        aggregate_id: impl ToString,
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::builder()
            .aggregate_type(aggregate_type)
            .aggregate_id(aggregate_id)
            .event_type(event_type)
            .payload(payload)?
            .build())
    }

    /// Creates a new event builder.
    pub fn builder() -> NewOutboxEventBuilder {
        NewOutboxEventBuilder::default()
    }
}

/// Builder for constructing outbox events.
#[derive(Debug, Default)]
pub struct NewOutboxEventBuilder {
    id: Option<OutboxEventId>,
    aggregate_type: Option<String>,
    aggregate_id: Option<String>,
    event_type: Option<String>,
    payload: Option<Vec<u8>>,
    created_at: Option<DateTime<Utc>>,
}

impl NewOutboxEventBuilder {
    /// Sets the record ID. If not set, a new ID will be generated.
    pub fn id(mut self, id: OutboxEventId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: impl ToString) -> Self {
        self.aggregate_id = Some(id.to_string());
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the payload from a serializable value, encoded as JSON.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_vec(payload)?);
        Ok(self)
    }

    /// Sets the payload from raw bytes.
    pub fn payload_raw(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Sets the creation time. If not set, the current time will be used.
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Builds the event.
    ///
    /// # Panics
    ///
    /// Panics if aggregate_type, aggregate_id, event_type or payload are not set.
    pub fn build(self) -> NewOutboxEvent {
        self.try_build()
            .expect("aggregate_type, aggregate_id, event_type and payload are required")
    }

    /// Tries to build the event, returning None if required fields are missing.
    pub fn try_build(self) -> Option<NewOutboxEvent> {
        Some(NewOutboxEvent {
            id: self.id.unwrap_or_default(),
            aggregate_type: self.aggregate_type?,
            aggregate_id: self.aggregate_id?,
            event_type: self.event_type?,
            payload: self.payload?,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        })
    }
}
