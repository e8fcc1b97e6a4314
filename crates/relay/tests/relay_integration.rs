//! Integration tests for the in-process relay wiring.

use std::time::Duration;

use booking::{BookingRepository, BookingStatus, PaymentRepository};
use outbox::{OutboxConfig, OutboxStore, PublishedMessage};
use relay::{Config, Relay};
use tokio_util::sync::CancellationToken;

fn fast_config(seed: u64) -> Config {
    Config {
        gateway_seed: seed,
        outbox: OutboxConfig::default().with_poll_interval(Duration::from_millis(10)),
        ..Config::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_demo_checkout_runs_to_a_terminal_status() {
    let relay = Relay::new(&fast_config(42));
    let store = relay.store().clone();
    let notifier = relay.notifier().clone();

    let booking = relay.seed_demo_booking().await.unwrap();
    let payment = relay
        .consumer()
        .saga()
        .start_checkout(booking.id, &booking.user_id)
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(relay.run(cancel.clone()));

    let status = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = store.find_booking(booking.id).await.unwrap().unwrap().status;
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("booking never reached a terminal status");

    cancel.cancel();
    handle.await.unwrap().unwrap();

    let stored = store.get_payment(payment.id).await.unwrap().unwrap();
    assert!(stored.status.is_terminal());
    assert_ne!(status, BookingStatus::AwaitingPayment);
    assert_eq!(notifier.attempts(), 1);
    assert!(store.outbox().list_unpublished(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_stops_on_cancel() {
    let relay = Relay::new(&fast_config(1));
    let cancel = CancellationToken::new();
    cancel.cancel();

    relay.run(cancel).await.unwrap();
}

#[tokio::test]
async fn test_dispatch_skips_dead_letter_exchange() {
    let relay = Relay::new(&fast_config(1));
    let message = PublishedMessage {
        exchange: "hotel.events.dlx".to_string(),
        routing_key: "dead.BookingPaymentInitiated".to_string(),
        payload: b"not json".to_vec(),
    };

    relay::dispatch(relay.consumer(), "hotel.events", message).await;

    assert_eq!(relay.store().payment_count().await, 0);
}

#[tokio::test]
async fn test_dispatch_survives_malformed_message() {
    let relay = Relay::new(&fast_config(1));
    let message = PublishedMessage {
        exchange: "hotel.events".to_string(),
        routing_key: "payment.succeeded".to_string(),
        payload: b"not json".to_vec(),
    };

    relay::dispatch(relay.consumer(), "hotel.events", message).await;
    assert_eq!(relay.notifier().attempts(), 0);
}
