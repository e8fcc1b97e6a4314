//! Booking aggregate and its status state machine.

use chrono::{DateTime, Utc};
use common::{BookingId, Money, RoomId, StayDates, UserId};
use serde::{Deserialize, Serialize};

/// The status of a booking along the checkout saga.
///
/// State transitions:
/// ```text
/// Pending ──► AwaitingPayment ──┬──► Confirmed
///                               ├──► Failed      (gateway declined)
///                               └──► Cancelled   (gateway timed out)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// No checkout started yet.
    #[default]
    Pending,

    /// A payment is in flight.
    AwaitingPayment,

    /// Payment succeeded (terminal state).
    Confirmed,

    /// Payment was declined (terminal state).
    Failed,

    /// Payment timed out (terminal state).
    Cancelled,
}

impl BookingStatus {
    /// Returns true if a checkout may start from this status.
    pub fn can_start_checkout(&self) -> bool {
        matches!(self, BookingStatus::Pending)
    }

    /// Returns true if the saga defines a transition from `self` to `next`.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::AwaitingPayment)
                | (
                    BookingStatus::AwaitingPayment,
                    BookingStatus::Confirmed | BookingStatus::Failed | BookingStatus::Cancelled
                )
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::Failed | BookingStatus::Cancelled
        )
    }

    /// Returns true if reaching this status gives the room nights back.
    pub fn releases_inventory(&self) -> bool {
        matches!(self, BookingStatus::Failed | BookingStatus::Cancelled)
    }

    /// Returns the stored name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::AwaitingPayment => "awaiting_payment",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Failed => "failed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "awaiting_payment" => Ok(BookingStatus::AwaitingPayment),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "failed" => Ok(BookingStatus::Failed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

/// A guest's reservation of a room for a stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub stay: StayDates,
    pub total_price: Money,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Creates a new pending booking.
    pub fn new(user_id: UserId, room_id: RoomId, stay: StayDates, total_price: Money) -> Self {
        Self {
            id: BookingId::new(),
            user_id,
            room_id,
            stay,
            total_price,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Returns true if the booking belongs to `user_id`.
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }
}
