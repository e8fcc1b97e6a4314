//! Routes published payment messages to the gateway and the saga.

use booking::{CheckoutStore, InventoryRestorer};
use outbox::routing::keys;
use serde::de::DeserializeOwned;
use tracing::{instrument, warn};

use crate::error::{Result, SagaError};
use crate::events::{PaymentInitiatedPayload, PaymentResultPayload};
use crate::gateway::{GatewayResult, GatewaySimulator, OutcomeSource};
use crate::orchestrator::CheckoutSaga;

/// What the consumer did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A `payment.initiated` message was handed to the gateway.
    Gateway(GatewayResult),
    /// A result message was applied to its booking.
    Resolved,
    /// No handler exists for the routing key; the message is acknowledged.
    Ignored,
}

/// Consumes payment messages from the primary exchange.
///
/// Every handler it calls is idempotent, so redelivered messages are safe.
pub struct PaymentEventConsumer<S, I, R> {
    saga: CheckoutSaga<S, I>,
    gateway: GatewaySimulator<S, R>,
}

impl<S, I, R> PaymentEventConsumer<S, I, R>
where
    S: CheckoutStore,
    I: InventoryRestorer,
    R: OutcomeSource,
{
    pub fn new(saga: CheckoutSaga<S, I>, gateway: GatewaySimulator<S, R>) -> Self {
        Self { saga, gateway }
    }

    pub fn saga(&self) -> &CheckoutSaga<S, I> {
        &self.saga
    }

    /// Decodes `payload` and dispatches it by routing key.
    ///
    /// Returns `BadRequest` if the payload does not decode.
    #[instrument(skip(self, payload), fields(routing_key = %routing_key))]
    pub async fn handle(&self, routing_key: &str, payload: &[u8]) -> Result<Dispatch> {
        match routing_key {
            keys::PAYMENT_INITIATED => {
                let message: PaymentInitiatedPayload = decode(payload)?;
                let result = self.gateway.process(message.payment_id).await?;
                Ok(Dispatch::Gateway(result))
            }
            keys::PAYMENT_SUCCEEDED => {
                let message: PaymentResultPayload = decode(payload)?;
                self.saga.handle_payment_success(message.payment_id).await?;
                Ok(Dispatch::Resolved)
            }
            keys::PAYMENT_FAILED => {
                let message: PaymentResultPayload = decode(payload)?;
                let reason = message.reason.as_deref().unwrap_or("payment declined");
                self.saga
                    .handle_payment_failure(message.payment_id, reason)
                    .await?;
                Ok(Dispatch::Resolved)
            }
            keys::PAYMENT_TIMED_OUT => {
                let message: PaymentResultPayload = decode(payload)?;
                self.saga.handle_payment_timeout(message.payment_id).await?;
                Ok(Dispatch::Resolved)
            }
            other => {
                warn!(routing_key = other, "no handler for routing key");
                Ok(Dispatch::Ignored)
            }
        }
    }
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload)
        .map_err(|e| SagaError::BadRequest(format!("malformed payment message: {e}")))
}
