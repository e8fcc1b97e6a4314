//! Relay worker that drains the outbox into the message broker.

use chrono::Utc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::config::OutboxConfig;
use crate::publisher::MessagePublisher;
use crate::routing::{dead_letter_key, routing_key_for};
use crate::store::OutboxStore;
use crate::{OutboxError, OutboxEvent, Result};

/// Counts of what one iteration did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Unpublished events fetched from the store.
    pub fetched: usize,
    /// Events delivered to the primary exchange.
    pub published: usize,
    /// Events delivered to the dead-letter exchange.
    pub dead_lettered: usize,
    /// Events whose publish or bookkeeping failed this iteration.
    pub failed: usize,
}

enum Delivery {
    Published,
    DeadLettered,
    Failed,
}

/// Polls the outbox and publishes pending events with bounded retries.
///
/// Each event in a batch is handled independently: a failure on one never
/// blocks the others, and no ordering is promised across events. An event
/// whose `retry_count` has reached `max_retries` is sent to the dead-letter
/// exchange under `dead.<event type>` and then marked published.
///
/// Delivery is at-least-once: if a publish succeeds but marking the record
/// fails, the event is sent again on the next poll.
pub struct OutboxWorker<S, P>
where
    S: OutboxStore,
    P: MessagePublisher,
{
    store: S,
    publisher: P,
    config: OutboxConfig,
}

impl<S, P> OutboxWorker<S, P>
where
    S: OutboxStore,
    P: MessagePublisher,
{
    /// Creates a new worker.
    pub fn new(store: S, publisher: P, config: OutboxConfig) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    /// Returns the worker configuration.
    pub fn config(&self) -> &OutboxConfig {
        &self.config
    }

    /// Processes one batch immediately, then one per poll interval, until
    /// `cancel` fires.
    ///
    /// A batch in progress always finishes before the loop observes
    /// cancellation. Always returns [`OutboxError::Cancelled`] on exit.
    #[tracing::instrument(skip_all, fields(exchange = %self.config.exchange))]
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "outbox worker started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!("outbox worker stopping");
                    return Err(OutboxError::Cancelled);
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "failed to fetch outbox batch");
                    }
                }
            }
        }
    }

    /// Runs a single iteration over up to `batch_size` unpublished events.
    ///
    /// Only a failure to list the batch is returned; per-event failures are
    /// logged and counted in the report.
    pub async fn run_once(&self) -> Result<BatchReport> {
        let started = std::time::Instant::now();
        let events = self.store.list_unpublished(self.config.batch_size).await?;

        let mut report = BatchReport {
            fetched: events.len(),
            ..BatchReport::default()
        };

        for event in &events {
            match self.deliver(event).await {
                Delivery::Published => report.published += 1,
                Delivery::DeadLettered => report.dead_lettered += 1,
                Delivery::Failed => report.failed += 1,
            }
        }

        metrics::histogram!("outbox_batch_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        if report.fetched > 0 {
            tracing::debug!(
                fetched = report.fetched,
                published = report.published,
                dead_lettered = report.dead_lettered,
                failed = report.failed,
                "outbox batch processed"
            );
        }

        Ok(report)
    }

    async fn deliver(&self, event: &OutboxEvent) -> Delivery {
        if event.retry_count >= self.config.max_retries {
            return self.dead_letter(event).await;
        }

        let routing_key = routing_key_for(&event.event_type);
        if let Err(e) = self
            .publisher
            .publish(&self.config.exchange, routing_key, &event.payload)
            .await
        {
            metrics::counter!("outbox_publish_failures_total").increment(1);
            tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                retry_count = event.retry_count + 1,
                error = %e,
                "outbox publish failed"
            );
            if let Err(e) = self.store.increment_retry(event.id).await {
                tracing::error!(event_id = %event.id, error = %e, "failed to record outbox retry");
            }
            return Delivery::Failed;
        }

        if let Err(e) = self.store.mark_published(event.id, Utc::now()).await {
            tracing::error!(
                event_id = %event.id,
                error = %e,
                "published event could not be marked; it will be redelivered"
            );
            return Delivery::Failed;
        }

        metrics::counter!("outbox_events_published_total").increment(1);
        tracing::debug!(event_id = %event.id, %routing_key, "outbox event published");
        Delivery::Published
    }

    async fn dead_letter(&self, event: &OutboxEvent) -> Delivery {
        let routing_key = dead_letter_key(&event.event_type);

        if let Err(e) = self
            .publisher
            .publish(
                &self.config.dead_letter_exchange,
                &routing_key,
                &event.payload,
            )
            .await
        {
            tracing::error!(
                event_id = %event.id,
                %routing_key,
                error = %e,
                "dead-letter publish failed"
            );
            return Delivery::Failed;
        }

        if let Err(e) = self.store.mark_published(event.id, Utc::now()).await {
            tracing::error!(event_id = %event.id, error = %e, "failed to mark dead-lettered event");
            return Delivery::Failed;
        }

        metrics::counter!("outbox_events_dead_lettered_total").increment(1);
        tracing::warn!(
            event_id = %event.id,
            event_type = %event.event_type,
            retry_count = event.retry_count,
            "outbox event moved to dead-letter exchange"
        );
        Delivery::DeadLettered
    }
}
