//! Repository traits consumed by the checkout saga.

use async_trait::async_trait;
use common::{BookingId, PaymentId};
use outbox::NewOutboxEvent;

use crate::{Booking, BookingStatus, Payment, PaymentUpdate, Result};

/// Access to booking rows.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Loads a booking, or None if it does not exist.
    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>>;

    /// Sets the booking status.
    ///
    /// Fails with `StatusConflict` if the booking is in a terminal status
    /// other than `status`; terminal bookings never change again.
    async fn update_booking_status(&self, id: BookingId, status: BookingStatus) -> Result<()>;
}

/// Access to payment rows.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts a payment. Idempotency keys are unique.
    async fn create_payment(&self, payment: Payment) -> Result<Payment>;

    /// Loads a payment, or None if it does not exist.
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// Applies a status update. Absent reference/reason fields are kept.
    ///
    /// Fails with `StatusConflict` if the payment is in a terminal status
    /// other than `update.status`.
    async fn update_payment_status(&self, id: PaymentId, update: PaymentUpdate) -> Result<()>;
}

/// Multi-row writes that must commit together with their outbox event.
#[async_trait]
pub trait CheckoutStore: BookingRepository + PaymentRepository {
    /// In one unit of work: moves the booking from `pending` to
    /// `awaiting_payment`, inserts the payment and appends the event.
    ///
    /// Fails with `StatusConflict` (and writes nothing) if the booking is not
    /// `pending` when the unit of work runs.
    async fn begin_checkout(
        &self,
        booking_id: BookingId,
        payment: Payment,
        event: NewOutboxEvent,
    ) -> Result<Payment>;

    /// In one unit of work: applies the payment update and appends the event.
    ///
    /// Fails with `StatusConflict` (and writes nothing) if the payment is
    /// already terminal when the unit of work runs, so a payment gets at most
    /// one result event.
    async fn record_payment_outcome(
        &self,
        payment_id: PaymentId,
        update: PaymentUpdate,
        event: NewOutboxEvent,
    ) -> Result<()>;
}
