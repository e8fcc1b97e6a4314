//! Payment event payloads carried through the outbox.

use common::{BookingId, Money, PaymentId, UserId};
use outbox::NewOutboxEvent;
use outbox::routing::event_types;
use serde::{Deserialize, Serialize};

/// Aggregate type recorded on every payment outbox event.
pub const PAYMENT_AGGREGATE: &str = "Payment";

/// Payload of the event emitted when a checkout starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiatedPayload {
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    /// Amount in cents.
    pub amount: Money,
    pub currency: String,
    pub user_id: UserId,
}

impl PaymentInitiatedPayload {
    /// Encodes the payload as a `BookingPaymentInitiated` outbox event.
    pub fn to_event(&self) -> Result<NewOutboxEvent, serde_json::Error> {
        NewOutboxEvent::json(
            PAYMENT_AGGREGATE,
            self.payment_id,
            event_types::PAYMENT_INITIATED,
            self,
        )
    }
}

/// Terminal gateway outcome of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    TimedOut,
}

impl PaymentOutcome {
    /// Returns the outbox event type announcing this outcome.
    pub fn event_type(&self) -> &'static str {
        match self {
            PaymentOutcome::Succeeded => event_types::PAYMENT_SUCCEEDED,
            PaymentOutcome::Failed => event_types::PAYMENT_FAILED,
            PaymentOutcome::TimedOut => event_types::PAYMENT_TIMED_OUT,
        }
    }

    /// Returns the metric label of this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOutcome::Succeeded => "succeeded",
            PaymentOutcome::Failed => "failed",
            PaymentOutcome::TimedOut => "timed_out",
        }
    }
}

/// Payload of a payment result event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResultPayload {
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PaymentResultPayload {
    /// Encodes the payload as the outbox event for `outcome`.
    pub fn to_event(&self, outcome: PaymentOutcome) -> Result<NewOutboxEvent, serde_json::Error> {
        NewOutboxEvent::json(
            PAYMENT_AGGREGATE,
            self.payment_id,
            outcome.event_type(),
            self,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiated_event() {
        let payload = PaymentInitiatedPayload {
            payment_id: PaymentId::new(),
            booking_id: BookingId::new(),
            amount: Money::from_units(200),
            currency: "USD".to_string(),
            user_id: UserId::new("user-1"),
        };

        let event = payload.to_event().unwrap();

        assert_eq!(event.aggregate_type, "Payment");
        assert_eq!(event.aggregate_id, payload.payment_id.to_string());
        assert_eq!(event.event_type, "BookingPaymentInitiated");
        let json: serde_json::Value = serde_json::from_slice(&event.payload).unwrap();
        assert_eq!(json["amount"], 20000);
        assert_eq!(json["user_id"], "user-1");
        assert_eq!(json["currency"], "USD");
    }

    #[test]
    fn test_result_payload_omits_absent_fields() {
        let payload = PaymentResultPayload {
            payment_id: PaymentId::new(),
            booking_id: BookingId::new(),
            gateway_ref: Some("gw-1".to_string()),
            reason: None,
        };

        let event = payload.to_event(PaymentOutcome::Succeeded).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&event.payload).unwrap();

        assert_eq!(event.event_type, "PaymentSucceeded");
        assert_eq!(json["gateway_ref"], "gw-1");
        assert!(json.get("reason").is_none());

        let decoded: PaymentResultPayload = serde_json::from_slice(&event.payload).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_outcome_event_types() {
        assert_eq!(PaymentOutcome::Failed.event_type(), "PaymentFailed");
        assert_eq!(PaymentOutcome::TimedOut.event_type(), "PaymentTimedOut");
        assert_eq!(PaymentOutcome::TimedOut.as_str(), "timed_out");
    }
}
