//! PostgreSQL integration tests for the booking store.
//!
//! These tests share one PostgreSQL container and truncate every table
//! before each test. Run with:
//!
//! ```bash
//! cargo test -p booking --test postgres_integration
//! ```

use std::sync::Arc;

use booking::{
    Booking, BookingRepository, BookingStatus, CheckoutStore, InventoryRestorer, Payment,
    PaymentRepository, PaymentStatus, PaymentUpdate, PostgresStore, StoreError,
};
use chrono::NaiveDate;
use common::{Money, RoomId, StayDates, UserId};
use outbox::{NewOutboxEvent, OutboxStore, PostgresOutboxStore};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(pool.clone())
                .run_migrations()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE payments, bookings, outbox_events, room_inventory, inventory_releases CASCADE")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn stay() -> StayDates {
    StayDates::new(
        NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        NaiveDate::from_ymd_opt(2026, 9, 4).unwrap(),
    )
    .unwrap()
}

fn booking() -> Booking {
    Booking::new(
        UserId::new("user-1"),
        RoomId::new(),
        stay(),
        Money::from_units(300),
    )
}

fn event_for(payment: &Payment, event_type: &str) -> NewOutboxEvent {
    NewOutboxEvent::builder()
        .aggregate_type("Payment")
        .aggregate_id(payment.id)
        .event_type(event_type)
        .payload_raw(b"{}".to_vec())
        .build()
}

#[tokio::test]
#[serial]
async fn test_booking_round_trip() {
    let store = get_test_store().await;
    let booking = booking();
    store.insert_booking(&booking).await.unwrap();

    let loaded = store.find_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(loaded.user_id, booking.user_id);
    assert_eq!(loaded.stay, booking.stay);
    assert_eq!(loaded.total_price, Money::from_cents(30000));
    assert_eq!(loaded.status, BookingStatus::Pending);
}

#[tokio::test]
#[serial]
async fn test_begin_checkout_commits_everything() {
    let store = get_test_store().await;
    let outbox = PostgresOutboxStore::new(store.pool().clone());
    let booking = booking();
    store.insert_booking(&booking).await.unwrap();

    let payment = Payment::pending(booking.id, &booking.user_id, booking.total_price, "USD");
    let event = event_for(&payment, "BookingPaymentInitiated");
    let created = store
        .begin_checkout(booking.id, payment, event)
        .await
        .unwrap();

    assert_eq!(created.status, PaymentStatus::Pending);
    assert_eq!(created.amount, Money::from_cents(30000));
    let loaded = store.find_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, BookingStatus::AwaitingPayment);

    let pending = outbox.list_unpublished(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].aggregate_id, created.id.to_string());
}

#[tokio::test]
#[serial]
async fn test_second_checkout_rolls_back() {
    let store = get_test_store().await;
    let outbox = PostgresOutboxStore::new(store.pool().clone());
    let booking = booking();
    store.insert_booking(&booking).await.unwrap();

    let payment = Payment::pending(booking.id, &booking.user_id, booking.total_price, "USD");
    let event = event_for(&payment, "BookingPaymentInitiated");
    store.begin_checkout(booking.id, payment, event).await.unwrap();

    let payment = Payment::pending(booking.id, &booking.user_id, booking.total_price, "USD");
    let event = event_for(&payment, "BookingPaymentInitiated");
    let result = store.begin_checkout(booking.id, payment, event).await;

    assert!(matches!(result, Err(StoreError::StatusConflict { .. })));
    assert_eq!(outbox.list_unpublished(10).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_overlapping_checkouts_commit_once() {
    let store = get_test_store().await;
    let outbox = PostgresOutboxStore::new(store.pool().clone());
    let booking = booking();
    store.insert_booking(&booking).await.unwrap();

    // Distinct idempotency keys, so only the row lock can decide the race.
    let first = Payment::pending(booking.id, &booking.user_id, booking.total_price, "USD");
    let mut second = Payment::pending(booking.id, &booking.user_id, booking.total_price, "USD");
    second.idempotency_key.push_str(":retry");
    let first_event = event_for(&first, "BookingPaymentInitiated");
    let second_event = event_for(&second, "BookingPaymentInitiated");

    let (a, b) = tokio::join!(
        store.begin_checkout(booking.id, first, first_event),
        store.begin_checkout(booking.id, second, second_event),
    );

    assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
    assert!(matches!(
        a.err().or(b.err()),
        Some(StoreError::StatusConflict { .. })
    ));
    let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE booking_id = $1")
        .bind(booking.id.as_uuid())
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(payments, 1);
    assert_eq!(outbox.list_unpublished(10).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_duplicate_idempotency_key() {
    let store = get_test_store().await;
    let booking = booking();
    store.insert_booking(&booking).await.unwrap();

    let first = Payment::pending(booking.id, &booking.user_id, booking.total_price, "USD");
    store.create_payment(first).await.unwrap();

    let second = Payment::pending(booking.id, &booking.user_id, booking.total_price, "USD");
    let result = store.create_payment(second).await;
    assert!(matches!(
        result,
        Err(StoreError::DuplicateIdempotencyKey(_))
    ));
}

#[tokio::test]
#[serial]
async fn test_record_outcome_keeps_reference() {
    let store = get_test_store().await;
    let booking = booking();
    store.insert_booking(&booking).await.unwrap();
    let payment = Payment::pending(booking.id, &booking.user_id, booking.total_price, "USD");
    let payment = store.create_payment(payment).await.unwrap();

    store
        .update_payment_status(payment.id, PaymentUpdate::processing())
        .await
        .unwrap();
    let event = event_for(&payment, "PaymentSucceeded");
    store
        .record_payment_outcome(
            payment.id,
            PaymentUpdate::succeeded(Some("gw-123".to_string())),
            event,
        )
        .await
        .unwrap();
    store
        .update_payment_status(payment.id, PaymentUpdate::succeeded(None))
        .await
        .unwrap();

    let loaded = store.get_payment(payment.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, PaymentStatus::Succeeded);
    assert_eq!(loaded.gateway_ref.as_deref(), Some("gw-123"));
}

#[tokio::test]
#[serial]
async fn test_second_outcome_is_rejected() {
    let store = get_test_store().await;
    let outbox = PostgresOutboxStore::new(store.pool().clone());
    let booking = booking();
    store.insert_booking(&booking).await.unwrap();
    let payment = Payment::pending(booking.id, &booking.user_id, booking.total_price, "USD");
    let payment = store.create_payment(payment).await.unwrap();

    store
        .record_payment_outcome(
            payment.id,
            PaymentUpdate::timed_out("no response"),
            event_for(&payment, "PaymentTimedOut"),
        )
        .await
        .unwrap();
    let result = store
        .record_payment_outcome(
            payment.id,
            PaymentUpdate::succeeded(Some("gw-9".to_string())),
            event_for(&payment, "PaymentSucceeded"),
        )
        .await;
    assert!(matches!(result, Err(StoreError::StatusConflict { .. })));

    let reopen = store
        .update_payment_status(payment.id, PaymentUpdate::processing())
        .await;
    assert!(matches!(reopen, Err(StoreError::StatusConflict { .. })));

    let loaded = store.get_payment(payment.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, PaymentStatus::TimedOut);
    assert!(loaded.gateway_ref.is_none());
    assert_eq!(outbox.list_unpublished(10).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_terminal_booking_rejects_other_status() {
    let store = get_test_store().await;
    let mut booking = booking();
    booking.status = BookingStatus::Cancelled;
    store.insert_booking(&booking).await.unwrap();

    let result = store
        .update_booking_status(booking.id, BookingStatus::Confirmed)
        .await;
    assert!(matches!(result, Err(StoreError::StatusConflict { .. })));

    store
        .update_booking_status(booking.id, BookingStatus::Cancelled)
        .await
        .unwrap();

    let missing = store
        .update_booking_status(common::BookingId::new(), BookingStatus::Confirmed)
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
#[serial]
async fn test_restore_adds_one_per_night() {
    let store = get_test_store().await;
    let room = RoomId::new();
    store.set_available(room, stay(), 4).await.unwrap();

    store.restore(room, stay()).await.unwrap();

    for night in stay().each_night() {
        assert_eq!(store.available(room, night).await.unwrap(), 5);
    }
    assert_eq!(store.available(room, stay().check_out).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn test_restore_creates_missing_nights() {
    let store = get_test_store().await;
    let room = RoomId::new();

    store.restore(room, stay()).await.unwrap();

    assert_eq!(store.available(room, stay().check_in).await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_restore_booking_only_once() {
    let store = get_test_store().await;
    let booking = booking();
    store.set_available(booking.room_id, stay(), 2).await.unwrap();

    assert!(store.restore_booking(&booking).await.unwrap());
    assert!(!store.restore_booking(&booking).await.unwrap());

    for night in stay().each_night() {
        assert_eq!(store.available(booking.room_id, night).await.unwrap(), 3);
    }
}
