use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{BookingId, PaymentId};
use outbox::{InMemoryOutboxStore, NewOutboxEvent, OutboxStore};
use tokio::sync::RwLock;

use crate::{
    Booking, BookingRepository, BookingStatus, CheckoutStore, Payment, PaymentRepository,
    PaymentUpdate, Result, StoreError,
};

#[derive(Default)]
struct Tables {
    bookings: HashMap<BookingId, Booking>,
    payments: HashMap<PaymentId, Payment>,
}

#[derive(Default)]
struct Faults {
    payment_update: AtomicBool,
    booking_update: AtomicBool,
}

/// In-memory booking/payment store for testing and single-process runs.
///
/// Shares its outbox with the [`InMemoryOutboxStore`] it was built from.
/// Units of work run under one write lock, and every check that can fail
/// happens before the first write, so a failed unit leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    outbox: InMemoryOutboxStore,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    /// Creates an empty store with its own outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store writing events into `outbox`.
    pub fn with_outbox(outbox: InMemoryOutboxStore) -> Self {
        Self {
            outbox,
            ..Self::default()
        }
    }

    /// Returns the outbox this store appends to.
    pub fn outbox(&self) -> &InMemoryOutboxStore {
        &self.outbox
    }

    /// Inserts or replaces a booking.
    pub async fn insert_booking(&self, booking: Booking) {
        self.tables
            .write()
            .await
            .bookings
            .insert(booking.id, booking);
    }

    /// Returns the number of stored payments.
    pub async fn payment_count(&self) -> usize {
        self.tables.read().await.payments.len()
    }

    /// Makes payment status updates fail.
    pub fn set_fail_on_payment_update(&self, fail: bool) {
        self.faults.payment_update.store(fail, Ordering::SeqCst);
    }

    /// Makes booking status updates fail.
    pub fn set_fail_on_booking_update(&self, fail: bool) {
        self.faults.booking_update.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{what} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn update_booking_status(&self, id: BookingId, status: BookingStatus) -> Result<()> {
        Self::check(&self.faults.booking_update, "booking update")?;

        let mut tables = self.tables.write().await;
        let booking = tables
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Booking", id))?;

        if booking.status.is_terminal() && booking.status != status {
            return Err(StoreError::status_conflict("Booking", id, booking.status));
        }
        booking.status = status;
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn create_payment(&self, payment: Payment) -> Result<Payment> {
        let mut tables = self.tables.write().await;
        if tables
            .payments
            .values()
            .any(|p| p.idempotency_key == payment.idempotency_key)
        {
            return Err(StoreError::DuplicateIdempotencyKey(payment.idempotency_key));
        }
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn update_payment_status(&self, id: PaymentId, update: PaymentUpdate) -> Result<()> {
        Self::check(&self.faults.payment_update, "payment update")?;

        let mut tables = self.tables.write().await;
        let payment = tables
            .payments
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Payment", id))?;

        if payment.status.is_terminal() && payment.status != update.status {
            return Err(StoreError::status_conflict("Payment", id, payment.status));
        }
        payment.apply(&update);
        Ok(())
    }
}

#[async_trait]
impl CheckoutStore for InMemoryStore {
    async fn begin_checkout(
        &self,
        booking_id: BookingId,
        payment: Payment,
        event: NewOutboxEvent,
    ) -> Result<Payment> {
        let mut tables = self.tables.write().await;

        Self::check(&self.faults.booking_update, "booking update")?;

        let status = tables
            .bookings
            .get(&booking_id)
            .map(|b| b.status)
            .ok_or_else(|| StoreError::not_found("Booking", booking_id))?;
        if !status.can_start_checkout() {
            return Err(StoreError::status_conflict("Booking", booking_id, status));
        }
        if tables
            .payments
            .values()
            .any(|p| p.idempotency_key == payment.idempotency_key)
        {
            return Err(StoreError::DuplicateIdempotencyKey(payment.idempotency_key));
        }

        // Last fallible step; everything after it is an in-memory write.
        self.outbox.create_event(event).await?;

        tables.payments.insert(payment.id, payment.clone());
        if let Some(booking) = tables.bookings.get_mut(&booking_id) {
            booking.status = BookingStatus::AwaitingPayment;
        }
        Ok(payment)
    }

    async fn record_payment_outcome(
        &self,
        payment_id: PaymentId,
        update: PaymentUpdate,
        event: NewOutboxEvent,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;

        Self::check(&self.faults.payment_update, "payment update")?;
        let status = tables
            .payments
            .get(&payment_id)
            .map(|p| p.status)
            .ok_or_else(|| StoreError::not_found("Payment", payment_id))?;
        if status.is_terminal() {
            return Err(StoreError::status_conflict("Payment", payment_id, status));
        }

        self.outbox.create_event(event).await?;

        if let Some(payment) = tables.payments.get_mut(&payment_id) {
            payment.apply(&update);
        }
        Ok(())
    }
}
