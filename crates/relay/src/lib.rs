//! In-process relay for the checkout saga.
//!
//! Wires the outbox worker to a channel-backed publisher and feeds every
//! message on the primary exchange to the payment consumer, so the whole
//! checkout pipeline runs in one process against in-memory stores.

pub mod config;
pub mod error;

use std::sync::Arc;

use booking::{Booking, InMemoryInventory, InMemoryStore};
use chrono::{Days, Utc};
use common::{Money, RoomId, StayDates, UserId};
use outbox::{ChannelPublisher, InMemoryOutboxStore, OutboxError, OutboxWorker, PublishedMessage};
use saga::{
    CheckoutSaga, GatewaySimulator, PaymentEventConsumer, RecordingNotifier, SeededOutcomeSource,
};
use tokio::signal;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

pub use config::{Config, LogFormat};
pub use error::{RelayError, Result};

pub type RelayConsumer = PaymentEventConsumer<InMemoryStore, InMemoryInventory, SeededOutcomeSource>;
pub type RelayWorker = OutboxWorker<InMemoryOutboxStore, ChannelPublisher>;

/// Every component of a running relay.
pub struct Relay {
    store: InMemoryStore,
    inventory: InMemoryInventory,
    notifier: RecordingNotifier,
    worker: Arc<RelayWorker>,
    consumer: RelayConsumer,
    messages: UnboundedReceiver<PublishedMessage>,
}

impl Relay {
    /// Builds the relay from configuration.
    pub fn new(config: &Config) -> Self {
        let outbox = InMemoryOutboxStore::new();
        let store = InMemoryStore::with_outbox(outbox.clone());
        let inventory = InMemoryInventory::new();
        let notifier = RecordingNotifier::new();
        let (publisher, messages) = ChannelPublisher::new();

        let saga = CheckoutSaga::new(store.clone(), inventory.clone())
            .with_notifier(Arc::new(notifier.clone()))
            .with_currency(config.currency.clone());
        let gateway = GatewaySimulator::new(
            store.clone(),
            SeededOutcomeSource::from_seed(config.gateway_seed),
        );
        let worker = OutboxWorker::new(outbox, publisher, config.outbox.clone());

        Self {
            store,
            inventory,
            notifier,
            worker: Arc::new(worker),
            consumer: PaymentEventConsumer::new(saga, gateway),
            messages,
        }
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    pub fn inventory(&self) -> &InMemoryInventory {
        &self.inventory
    }

    pub fn notifier(&self) -> &RecordingNotifier {
        &self.notifier
    }

    pub fn consumer(&self) -> &RelayConsumer {
        &self.consumer
    }

    /// Inserts a pending two-night booking whose nights are already reserved.
    pub async fn seed_demo_booking(&self) -> Result<Booking> {
        let check_in = Utc::now().date_naive() + Days::new(7);
        let check_out = check_in + Days::new(2);
        let stay = StayDates::new(check_in, check_out).ok_or_else(|| {
            booking::StoreError::Corrupt(format!("stay {check_in}..{check_out}"))
        })?;

        let booking = Booking::new(
            UserId::new("demo-user"),
            RoomId::new(),
            stay,
            Money::from_units(200),
        );
        self.inventory.set_available(booking.room_id, stay, 1);
        self.inventory.reserve(booking.room_id, stay)?;
        self.store.insert_booking(booking.clone()).await;

        tracing::info!(booking_id = %booking.id, "demo booking seeded");
        Ok(booking)
    }

    /// Runs the outbox worker and the consumer until `cancel` fires.
    ///
    /// The worker finishes its current batch before stopping. Messages still
    /// queued on the channel when cancellation arrives are dropped.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let worker = Arc::clone(&self.worker);
        let worker_cancel = cancel.clone();
        let worker_task = tokio::spawn(async move { worker.run(worker_cancel).await });

        let primary = self.worker.config().exchange.clone();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                message = self.messages.recv() => match message {
                    Some(message) => dispatch(&self.consumer, &primary, message).await,
                    None => break,
                },
            }
        }

        match worker_task.await? {
            Ok(()) | Err(OutboxError::Cancelled) => {}
            Err(e) => tracing::error!(error = %e, "outbox worker exited"),
        }
        Ok(())
    }
}

/// Hands one published message to the consumer.
///
/// Dead-lettered messages are only logged; consumer errors are logged and
/// the message is dropped.
pub async fn dispatch(consumer: &RelayConsumer, primary_exchange: &str, message: PublishedMessage) {
    if message.exchange != primary_exchange {
        tracing::warn!(
            exchange = %message.exchange,
            routing_key = %message.routing_key,
            "message dead-lettered"
        );
        return;
    }

    if let Err(e) = consumer
        .handle(&message.routing_key, &message.payload)
        .await
    {
        metrics::counter!("relay_consumer_errors_total").increment(1);
        tracing::error!(
            routing_key = %message.routing_key,
            kind = ?e.kind(),
            error = %e,
            "failed to handle message"
        );
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}
