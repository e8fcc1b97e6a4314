//! Test doubles shared by the unit test modules.

use async_trait::async_trait;
use booking::{
    Booking, BookingRepository, BookingStatus, CheckoutStore, InMemoryStore, Payment,
    PaymentRepository, PaymentUpdate, Result,
};
use common::{BookingId, PaymentId};
use outbox::NewOutboxEvent;

/// Yields to the scheduler after every read, so two calls joined on one
/// task both read before either writes.
#[derive(Clone)]
pub(crate) struct YieldingStore(pub InMemoryStore);

#[async_trait]
impl BookingRepository for YieldingStore {
    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        let booking = self.0.find_booking(id).await;
        tokio::task::yield_now().await;
        booking
    }

    async fn update_booking_status(&self, id: BookingId, status: BookingStatus) -> Result<()> {
        self.0.update_booking_status(id, status).await
    }
}

#[async_trait]
impl PaymentRepository for YieldingStore {
    async fn create_payment(&self, payment: Payment) -> Result<Payment> {
        self.0.create_payment(payment).await
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let payment = self.0.get_payment(id).await;
        tokio::task::yield_now().await;
        payment
    }

    async fn update_payment_status(&self, id: PaymentId, update: PaymentUpdate) -> Result<()> {
        self.0.update_payment_status(id, update).await
    }
}

#[async_trait]
impl CheckoutStore for YieldingStore {
    async fn begin_checkout(
        &self,
        booking_id: BookingId,
        payment: Payment,
        event: NewOutboxEvent,
    ) -> Result<Payment> {
        self.0.begin_checkout(booking_id, payment, event).await
    }

    async fn record_payment_outcome(
        &self,
        payment_id: PaymentId,
        update: PaymentUpdate,
        event: NewOutboxEvent,
    ) -> Result<()> {
        self.0.record_payment_outcome(payment_id, update, event).await
    }
}
