//! Event type tags and the fixed routing-key table.

/// Event type tags written by the checkout saga.
pub mod event_types {
    pub const PAYMENT_INITIATED: &str = "BookingPaymentInitiated";
    pub const PAYMENT_SUCCEEDED: &str = "PaymentSucceeded";
    pub const PAYMENT_FAILED: &str = "PaymentFailed";
    pub const PAYMENT_TIMED_OUT: &str = "PaymentTimedOut";
}

/// Routing keys on the primary exchange.
pub mod keys {
    pub const PAYMENT_INITIATED: &str = "payment.initiated";
    pub const PAYMENT_SUCCEEDED: &str = "payment.succeeded";
    pub const PAYMENT_FAILED: &str = "payment.failed";
    pub const PAYMENT_TIMED_OUT: &str = "payment.timed_out";
    pub const PAYMENT_UNKNOWN: &str = "payment.unknown";
}

/// Prefix of every dead-letter routing key.
pub const DEAD_LETTER_PREFIX: &str = "dead.";

/// Maps an event type to its routing key.
///
/// Unrecognized types are routed to [`keys::PAYMENT_UNKNOWN`] rather than
/// rejected.
pub fn routing_key_for(event_type: &str) -> &'static str {
    match event_type {
        event_types::PAYMENT_INITIATED => keys::PAYMENT_INITIATED,
        event_types::PAYMENT_SUCCEEDED => keys::PAYMENT_SUCCEEDED,
        event_types::PAYMENT_FAILED => keys::PAYMENT_FAILED,
        event_types::PAYMENT_TIMED_OUT => keys::PAYMENT_TIMED_OUT,
        _ => keys::PAYMENT_UNKNOWN,
    }
}

/// Routing key used on the dead-letter exchange: `dead.<event type>`.
pub fn dead_letter_key(event_type: &str) -> String {
    format!("{DEAD_LETTER_PREFIX}{event_type}")
}
