//! Payment gateway simulator.

use std::sync::{Mutex, PoisonError};

use booking::{CheckoutStore, PaymentStatus, PaymentUpdate, StoreError};
use common::PaymentId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{Result, SagaError, StoreContext};
use crate::events::{PaymentOutcome, PaymentResultPayload};

/// Rolls below this succeed.
pub const SUCCESS_THRESHOLD: f64 = 0.80;

/// Rolls below this (and at or above [`SUCCESS_THRESHOLD`]) are declined.
pub const DECLINE_THRESHOLD: f64 = 0.95;

/// Reason recorded on declined payments.
pub const DECLINE_REASON: &str = "card declined by issuer";

/// Reason recorded on timed-out payments.
pub const TIMEOUT_REASON: &str = "gateway did not respond in time";

/// Source of uniform rolls in `[0, 1)`.
pub trait OutcomeSource: Send + Sync {
    fn roll(&self) -> f64;
}

/// Pseudo-random rolls from a seeded generator.
pub struct SeededOutcomeSource {
    rng: Mutex<StdRng>,
}

impl SeededOutcomeSource {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl OutcomeSource for SeededOutcomeSource {
    fn roll(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0.0..1.0)
    }
}

/// Always returns the same roll.
#[derive(Debug, Clone, Copy)]
pub struct FixedOutcome(pub f64);

impl FixedOutcome {
    pub fn succeed() -> Self {
        Self(0.0)
    }

    pub fn decline() -> Self {
        Self(SUCCESS_THRESHOLD)
    }

    pub fn time_out() -> Self {
        Self(DECLINE_THRESHOLD)
    }
}

impl OutcomeSource for FixedOutcome {
    fn roll(&self) -> f64 {
        self.0
    }
}

/// What a call to [`GatewaySimulator::process`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayResult {
    /// The payment reached this outcome and one result event was appended.
    Resolved(PaymentOutcome),
    /// The payment was already terminal; nothing was written.
    AlreadyResolved(PaymentStatus),
}

/// Resolves pending payments the way a real gateway integration would:
/// one terminal status and one result event per payment.
pub struct GatewaySimulator<S, R> {
    store: S,
    outcomes: R,
}

impl<S, R> GatewaySimulator<S, R>
where
    S: CheckoutStore,
    R: OutcomeSource,
{
    pub fn new(store: S, outcomes: R) -> Self {
        Self { store, outcomes }
    }

    /// Maps a roll in `[0, 1)` to an outcome.
    pub fn outcome_for(roll: f64) -> PaymentOutcome {
        if roll < SUCCESS_THRESHOLD {
            PaymentOutcome::Succeeded
        } else if roll < DECLINE_THRESHOLD {
            PaymentOutcome::Failed
        } else {
            PaymentOutcome::TimedOut
        }
    }

    /// Processes a payment.
    ///
    /// A payment that is already terminal is left untouched, so a redelivered
    /// trigger is harmless. Otherwise the payment is marked `processing`,
    /// resolved, and its terminal status is written together with the result
    /// event. If an overlapping call resolves the payment first, the store
    /// refuses the second write and this call reports `AlreadyResolved`.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn process(&self, payment_id: PaymentId) -> Result<GatewayResult> {
        let payment = self
            .store
            .get_payment(payment_id)
            .await
            .context("load payment")?
            .ok_or_else(|| SagaError::not_found("Payment", payment_id))?;

        if payment.status.is_terminal() {
            debug!(status = %payment.status, "payment already resolved");
            return Ok(GatewayResult::AlreadyResolved(payment.status));
        }

        match self
            .store
            .update_payment_status(payment_id, PaymentUpdate::processing())
            .await
        {
            Err(StoreError::StatusConflict { .. }) => return self.already_resolved(payment_id).await,
            result => result.context("mark payment processing")?,
        }

        let outcome = Self::outcome_for(self.outcomes.roll());
        let mut payload = PaymentResultPayload {
            payment_id,
            booking_id: payment.booking_id,
            gateway_ref: None,
            reason: None,
        };
        let update = match outcome {
            PaymentOutcome::Succeeded => {
                let gateway_ref = format!("gw_{}", Uuid::new_v4().simple());
                payload.gateway_ref = Some(gateway_ref.clone());
                PaymentUpdate::succeeded(Some(gateway_ref))
            }
            PaymentOutcome::Failed => {
                payload.reason = Some(DECLINE_REASON.to_string());
                PaymentUpdate::failed(DECLINE_REASON)
            }
            PaymentOutcome::TimedOut => {
                payload.reason = Some(TIMEOUT_REASON.to_string());
                PaymentUpdate::timed_out(TIMEOUT_REASON)
            }
        };

        match self
            .store
            .record_payment_outcome(payment_id, update, payload.to_event(outcome)?)
            .await
        {
            Err(StoreError::StatusConflict { .. }) => return self.already_resolved(payment_id).await,
            result => result.context("record payment outcome")?,
        }

        metrics::counter!("gateway_resolutions_total", "outcome" => outcome.as_str())
            .increment(1);
        info!(outcome = outcome.as_str(), "payment resolved");
        Ok(GatewayResult::Resolved(outcome))
    }

    async fn already_resolved(&self, payment_id: PaymentId) -> Result<GatewayResult> {
        let status = self
            .store
            .get_payment(payment_id)
            .await
            .context("load payment")?
            .ok_or_else(|| SagaError::not_found("Payment", payment_id))?
            .status;
        debug!(status = %status, "payment resolved by another delivery");
        Ok(GatewayResult::AlreadyResolved(status))
    }
}
