//! Checkout saga orchestrator.

use std::sync::Arc;

use booking::{
    Booking, BookingStatus, CheckoutStore, InventoryRestorer, Payment, PaymentStatus,
    PaymentUpdate,
};
use common::{BookingId, PaymentId, UserId};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SagaError, StoreContext};
use crate::events::{PaymentInitiatedPayload, PaymentOutcome};
use crate::notification::{NotificationKind, NotificationSender};

/// Currency used for new payments unless configured otherwise.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Fixed message sent to the user when the gateway times out.
pub const TIMED_OUT_MESSAGE: &str = "Payment for your booking timed out";

/// Drives a booking through checkout and its payment outcome.
///
/// The saga is stateless between calls: every step reads the current rows
/// from the store. Result handlers tolerate duplicate delivery, so they can
/// sit behind an at-least-once outbox.
pub struct CheckoutSaga<S, I> {
    store: S,
    inventory: I,
    notifier: Option<Arc<dyn NotificationSender>>,
    currency: String,
}

impl<S, I> CheckoutSaga<S, I>
where
    S: CheckoutStore,
    I: InventoryRestorer,
{
    /// Creates a saga without a notifier.
    pub fn new(store: S, inventory: I) -> Self {
        Self {
            store,
            inventory,
            notifier: None,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Sets the notifier used after each payment outcome.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSender>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Sets the currency of new payments.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Gets a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Starts the checkout of a pending booking.
    ///
    /// Creates a pending payment for the booking's total price, appends a
    /// `BookingPaymentInitiated` event and moves the booking to
    /// `awaiting_payment`, all in one unit of work.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if `user_id` is blank
    /// - `NotFound` if the booking does not exist
    /// - `Forbidden` if the booking belongs to another user
    /// - `Conflict` if the booking is not `pending`, including when a
    ///   concurrent checkout wins the race
    #[instrument(skip(self, user_id), fields(booking_id = %booking_id, user_id = %user_id))]
    pub async fn start_checkout(&self, booking_id: BookingId, user_id: &UserId) -> Result<Payment> {
        if user_id.is_blank() {
            return Err(SagaError::BadRequest("user id is required".to_string()));
        }

        let booking = self.load_booking(booking_id).await?;

        if !booking.is_owned_by(user_id) {
            return Err(SagaError::Forbidden {
                booking_id: booking_id.to_string(),
                user_id: user_id.to_string(),
            });
        }

        if !booking.status.can_start_checkout() {
            return Err(SagaError::Conflict(format!(
                "booking {booking_id} is {}, expected pending",
                booking.status
            )));
        }

        let payment = Payment::pending(
            booking.id,
            user_id,
            booking.total_price,
            self.currency.clone(),
        );
        let event = PaymentInitiatedPayload {
            payment_id: payment.id,
            booking_id: booking.id,
            amount: payment.amount,
            currency: payment.currency.clone(),
            user_id: user_id.clone(),
        }
        .to_event()?;

        let payment = self
            .store
            .begin_checkout(booking_id, payment, event)
            .await
            .context("begin checkout")?;

        metrics::counter!("checkout_started_total").increment(1);
        info!(payment_id = %payment.id, amount = %payment.amount, "checkout started");
        Ok(payment)
    }

    /// Confirms the booking of a succeeded payment.
    ///
    /// Inventory stays committed.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn handle_payment_success(&self, payment_id: PaymentId) -> Result<()> {
        self.resolve(payment_id, PaymentOutcome::Succeeded, None)
            .await
    }

    /// Fails the booking of a declined payment and releases its nights.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn handle_payment_failure(&self, payment_id: PaymentId, reason: &str) -> Result<()> {
        self.resolve(payment_id, PaymentOutcome::Failed, Some(reason))
            .await
    }

    /// Cancels the booking of a timed-out payment and releases its nights.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn handle_payment_timeout(&self, payment_id: PaymentId) -> Result<()> {
        self.resolve(payment_id, PaymentOutcome::TimedOut, None)
            .await
    }

    async fn resolve(
        &self,
        payment_id: PaymentId,
        outcome: PaymentOutcome,
        reason: Option<&str>,
    ) -> Result<()> {
        let (payment_status, booking_status) = match outcome {
            PaymentOutcome::Succeeded => (PaymentStatus::Succeeded, BookingStatus::Confirmed),
            PaymentOutcome::Failed => (PaymentStatus::Failed, BookingStatus::Failed),
            PaymentOutcome::TimedOut => (PaymentStatus::TimedOut, BookingStatus::Cancelled),
        };

        let payment = self
            .store
            .get_payment(payment_id)
            .await
            .context("load payment")?
            .ok_or_else(|| SagaError::not_found("Payment", payment_id))?;

        if payment.status.is_terminal() && payment.status != payment_status {
            return Err(SagaError::Conflict(format!(
                "payment {payment_id} is already {}",
                payment.status
            )));
        }

        let booking = self.load_booking(payment.booking_id).await?;
        let already_applied = booking.status == booking_status;

        if !already_applied {
            if !booking.status.can_transition_to(booking_status) {
                return Err(SagaError::Conflict(format!(
                    "booking {} is {}, cannot become {booking_status}",
                    booking.id, booking.status
                )));
            }

            let update = match outcome {
                PaymentOutcome::Succeeded => PaymentUpdate::succeeded(None),
                PaymentOutcome::Failed => PaymentUpdate::failed(reason.unwrap_or_default()),
                PaymentOutcome::TimedOut => PaymentUpdate::status_only(PaymentStatus::TimedOut),
            };
            self.store
                .update_payment_status(payment_id, update)
                .await
                .context("update payment status")?;

            self.store
                .update_booking_status(booking.id, booking_status)
                .await
                .context("update booking status")?;
        }

        // Runs on every delivery; the restorer skips bookings it already
        // released, so a delivery that failed here is finished by the next.
        let restored = booking_status.releases_inventory()
            && self
                .inventory
                .restore_booking(&booking)
                .await
                .context("restore inventory")?;

        if already_applied && !restored {
            debug!(booking_id = %booking.id, status = %booking.status, "outcome already applied");
            return Ok(());
        }

        metrics::counter!("payment_outcomes_total", "outcome" => outcome.as_str()).increment(1);
        info!(booking_id = %booking.id, status = %booking_status, "booking resolved");

        self.notify(&booking, payment_id, outcome, reason).await;
        Ok(())
    }

    async fn load_booking(&self, booking_id: BookingId) -> Result<Booking> {
        self.store
            .find_booking(booking_id)
            .await
            .context("load booking")?
            .ok_or_else(|| SagaError::not_found("Booking", booking_id))
    }

    /// Best-effort: failures are logged and counted, never returned.
    async fn notify(
        &self,
        booking: &Booking,
        payment_id: PaymentId,
        outcome: PaymentOutcome,
        reason: Option<&str>,
    ) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        let (kind, title, message) = match outcome {
            PaymentOutcome::Succeeded => (
                NotificationKind::PaymentSucceeded,
                "Payment received",
                "Your booking is confirmed".to_string(),
            ),
            PaymentOutcome::Failed => (
                NotificationKind::PaymentFailed,
                "Payment failed",
                format!("Payment failed: {}", reason.unwrap_or_default()),
            ),
            PaymentOutcome::TimedOut => (
                NotificationKind::PaymentTimedOut,
                "Payment timed out",
                TIMED_OUT_MESSAGE.to_string(),
            ),
        };
        let data = serde_json::json!({
            "booking_id": booking.id,
            "payment_id": payment_id,
        });

        if let Err(err) = notifier
            .notify(&booking.user_id, kind, title, &message, data)
            .await
        {
            metrics::counter!("saga_notifications_failed_total").increment(1);
            warn!(error = %err, kind = %kind, "notification failed");
        }
    }
}
