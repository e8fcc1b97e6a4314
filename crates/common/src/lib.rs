//! Shared identifiers and value types for the checkout saga workspace.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{BookingId, OutboxEventId, PaymentId, RoomId, StayDates, UserId};
