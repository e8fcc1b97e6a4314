//! Message publisher trait and in-process implementations.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::PublishError;

/// A message as handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
}

/// Sends serialized events to a named exchange under a routing key.
///
/// Publishing may fail transiently; the outbox worker owns retries.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), PublishError>;
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    messages: Vec<PublishedMessage>,
    failing_exchanges: HashSet<String>,
    fail_all: bool,
    attempts: usize,
}

/// In-memory publisher that records every accepted message.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    /// Creates a new recording publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every publish while set.
    pub fn set_fail_all(&self, fail: bool) {
        self.write().fail_all = fail;
    }

    /// Rejects publishes to one exchange while set.
    pub fn set_fail_on_exchange(&self, exchange: &str, fail: bool) {
        let mut state = self.write();
        if fail {
            state.failing_exchanges.insert(exchange.to_string());
        } else {
            state.failing_exchanges.remove(exchange);
        }
    }

    /// Returns every accepted message in publish order.
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.read().messages.clone()
    }

    /// Returns the accepted messages for one exchange.
    pub fn messages_on(&self, exchange: &str) -> Vec<PublishedMessage> {
        self.read()
            .messages
            .iter()
            .filter(|m| m.exchange == exchange)
            .cloned()
            .collect()
    }

    /// Removes and returns every accepted message.
    pub fn drain(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut self.write().messages)
    }

    /// Returns the number of publish calls, accepted or not.
    pub fn attempt_count(&self) -> usize {
        self.read().attempts
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryPublisherState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryPublisherState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MessagePublisher for InMemoryPublisher {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), PublishError> {
        let mut state = self.write();
        state.attempts += 1;

        if state.fail_all || state.failing_exchanges.contains(exchange) {
            return Err(PublishError::Rejected {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                reason: "broker unavailable".to_string(),
            });
        }

        state.messages.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

/// Publisher that forwards messages to an in-process consumer over a channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<PublishedMessage>,
}

impl ChannelPublisher {
    /// Creates a publisher and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PublishedMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl MessagePublisher for ChannelPublisher {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), PublishError> {
        self.sender
            .send(PublishedMessage {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                payload: payload.to_vec(),
            })
            .map_err(|_| PublishError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_messages() {
        let publisher = InMemoryPublisher::new();
        publisher
            .publish("hotel.events", "payment.initiated", b"{}")
            .await
            .unwrap();

        let messages = publisher.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].routing_key, "payment.initiated");
        assert_eq!(publisher.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_on_exchange_only_affects_that_exchange() {
        let publisher = InMemoryPublisher::new();
        publisher.set_fail_on_exchange("primary", true);

        assert!(publisher.publish("primary", "k", b"").await.is_err());
        assert!(publisher.publish("dlx", "k", b"").await.is_ok());
        assert_eq!(publisher.messages_on("dlx").len(), 1);
        assert_eq!(publisher.attempt_count(), 2);
    }

    #[tokio::test]
    async fn test_channel_publisher_forwards_and_reports_closed() {
        let (publisher, mut receiver) = ChannelPublisher::new();
        publisher.publish("x", "payment.failed", b"1").await.unwrap();

        let message = receiver.recv().await.unwrap();
        assert_eq!(message.payload, b"1");

        drop(receiver);
        let result = publisher.publish("x", "payment.failed", b"2").await;
        assert!(matches!(result, Err(PublishError::Closed)));
    }
}
