//! Payment aggregate and its status state machine.

use chrono::{DateTime, Utc};
use common::{BookingId, Money, PaymentId, UserId};
use serde::{Deserialize, Serialize};

/// The status of a payment attempt.
///
/// State transitions:
/// ```text
/// Pending ──► Processing ──┬──► Succeeded ──► Refunded
///                          ├──► Failed
///                          └──► TimedOut
/// ```
/// Every status after `Processing` is terminal: a payment in one of them is
/// never processed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Succeeded,
    Failed,
    TimedOut,
    Refunded,
}

impl PaymentStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded
                | PaymentStatus::Failed
                | PaymentStatus::TimedOut
                | PaymentStatus::Refunded
        )
    }

    /// Returns the stored name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::TimedOut => "timed_out",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            "timed_out" => Ok(PaymentStatus::TimedOut),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

/// Builds the idempotency key of a checkout: `checkout:{booking}:{user}`.
pub fn checkout_idempotency_key(booking_id: BookingId, user_id: &UserId) -> String {
    format!("checkout:{booking_id}:{user_id}")
}

/// One attempt to collect money for a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub idempotency_key: String,
    pub gateway_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a pending payment for a checkout.
    pub fn pending(
        booking_id: BookingId,
        user_id: &UserId,
        amount: Money,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            booking_id,
            amount,
            currency: currency.into(),
            status: PaymentStatus::Pending,
            idempotency_key: checkout_idempotency_key(booking_id, user_id),
            gateway_ref: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a status update. Absent reference/reason fields keep their
    /// current values.
    pub fn apply(&mut self, update: &PaymentUpdate) {
        self.status = update.status;
        if let Some(gateway_ref) = &update.gateway_ref {
            self.gateway_ref = Some(gateway_ref.clone());
        }
        if let Some(reason) = &update.failure_reason {
            self.failure_reason = Some(reason.clone());
        }
        self.updated_at = Utc::now();
    }
}

/// A status change for a payment, with the fields that come with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub gateway_ref: Option<String>,
    pub failure_reason: Option<String>,
}

impl PaymentUpdate {
    /// Changes only the status; the stored reference and reason are kept.
    pub fn status_only(status: PaymentStatus) -> Self {
        Self {
            status,
            gateway_ref: None,
            failure_reason: None,
        }
    }

    pub fn processing() -> Self {
        Self::status_only(PaymentStatus::Processing)
    }

    pub fn succeeded(gateway_ref: Option<String>) -> Self {
        Self {
            status: PaymentStatus::Succeeded,
            gateway_ref,
            failure_reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Failed,
            gateway_ref: None,
            failure_reason: Some(reason.into()),
        }
    }

    pub fn timed_out(reason: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::TimedOut,
            gateway_ref: None,
            failure_reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Processing.is_terminal());
        assert!(PaymentStatus::Succeeded.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::TimedOut.is_terminal());
        assert!(PaymentStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_idempotency_key_is_deterministic() {
        let booking_id = BookingId::new();
        let user = UserId::new("user-1");
        assert_eq!(
            checkout_idempotency_key(booking_id, &user),
            format!("checkout:{booking_id}:user-1")
        );
        assert_eq!(
            checkout_idempotency_key(booking_id, &user),
            checkout_idempotency_key(booking_id, &user)
        );
    }

    #[test]
    fn test_pending_payment() {
        let booking_id = BookingId::new();
        let payment = Payment::pending(
            booking_id,
            &UserId::new("user-1"),
            Money::from_units(200),
            "USD",
        );
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, Money::from_cents(20000));
        assert_eq!(payment.booking_id, booking_id);
        assert!(payment.gateway_ref.is_none());
    }

    #[test]
    fn test_apply_keeps_existing_reference() {
        let mut payment = Payment::pending(
            BookingId::new(),
            &UserId::new("u"),
            Money::from_units(1),
            "USD",
        );
        payment.apply(&PaymentUpdate::succeeded(Some("gw-1".to_string())));
        payment.apply(&PaymentUpdate::succeeded(None));

        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(payment.gateway_ref.as_deref(), Some("gw-1"));
    }

    #[test]
    fn test_status_only_keeps_reason() {
        let mut payment = Payment::pending(
            BookingId::new(),
            &UserId::new("u"),
            Money::from_units(1),
            "USD",
        );
        payment.apply(&PaymentUpdate::timed_out("no response"));
        payment.apply(&PaymentUpdate::status_only(PaymentStatus::TimedOut));

        assert_eq!(payment.status, PaymentStatus::TimedOut);
        assert_eq!(payment.failure_reason.as_deref(), Some("no response"));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Processing,
            PaymentStatus::Succeeded,
            PaymentStatus::Failed,
            PaymentStatus::TimedOut,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
    }
}
