//! Checkout saga for hotel bookings.
//!
//! This crate provides:
//! - `CheckoutSaga`: starts a checkout and applies payment outcomes to the
//!   booking, releasing inventory on failure or timeout
//! - `GatewaySimulator`: resolves pending payments with an injected outcome
//!   source, writing one terminal status and one result event each
//! - `PaymentEventConsumer`: routes published payment messages to both
//!
//! State changes and their outbox events are written through
//! `booking::CheckoutStore` so they commit together.

pub mod consumer;
pub mod error;
pub mod events;
pub mod gateway;
pub mod notification;
pub mod orchestrator;

#[cfg(test)]
mod testing;

pub use consumer::{Dispatch, PaymentEventConsumer};
pub use error::{ErrorKind, Result, SagaError};
pub use events::{PAYMENT_AGGREGATE, PaymentInitiatedPayload, PaymentOutcome, PaymentResultPayload};
pub use gateway::{
    FixedOutcome, GatewayResult, GatewaySimulator, OutcomeSource, SeededOutcomeSource,
};
pub use notification::{NotificationKind, NotificationSender, RecordingNotifier, SentNotification};
pub use orchestrator::CheckoutSaga;
