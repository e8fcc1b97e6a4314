//! Transactional outbox for at-least-once delivery of domain events.
//!
//! State changes append an [`OutboxEvent`] in the same unit of work; the
//! [`OutboxWorker`] later relays unpublished events to a [`MessagePublisher`],
//! counting failed attempts and rerouting exhausted events to a dead-letter
//! exchange.

pub mod config;
pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod publisher;
pub mod routing;
pub mod store;
pub mod worker;

pub use common::OutboxEventId;
pub use config::OutboxConfig;
pub use error::{OutboxError, PublishError, Result};
pub use event::{NewOutboxEvent, NewOutboxEventBuilder, OutboxEvent};
pub use memory::InMemoryOutboxStore;
pub use postgres::PostgresOutboxStore;
pub use publisher::{ChannelPublisher, InMemoryPublisher, MessagePublisher, PublishedMessage};
pub use store::OutboxStore;
pub use worker::{BatchReport, OutboxWorker};
