use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier wraps a UUID to provide type safety and prevent mixing up
/// booking, payment, room and event identifiers.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parses an identifier from its hyphenated string form.
            pub fn parse_str(input: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(input.trim()).map(Self)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_str(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a booking.
    BookingId
);

uuid_id!(
    /// Unique identifier for a payment attempt.
    PaymentId
);

uuid_id!(
    /// Unique identifier for a hotel room.
    RoomId
);

uuid_id!(
    /// Unique identifier for an outbox record.
    OutboxEventId
);

/// Identifier of the guest, as issued by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the user ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The nights a booking occupies: check-in inclusive, check-out exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayDates {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayDates {
    /// Creates a date range. Returns None if check-out is not after check-in.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_out > check_in).then_some(Self {
            check_in,
            check_out,
        })
    }

    /// Number of nights in the stay.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Iterates over every occupied night.
    pub fn each_night(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.check_in
            .iter_days()
            .take_while(move |day| *day < self.check_out)
    }
}

impl std::fmt::Display for StayDates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.check_in, self.check_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn booking_id_new_creates_unique_ids() {
        let id1 = BookingId::new();
        let id2 = BookingId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn payment_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = PaymentId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn ids_parse_from_display_form() {
        let id = RoomId::new();
        let parsed: RoomId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!(BookingId::parse_str("not-a-uuid").is_err());
    }

    #[test]
    fn booking_id_serializes_transparently() {
        let id = BookingId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn blank_user_id() {
        assert!(UserId::new("  ").is_blank());
        assert!(!UserId::new("user-1").is_blank());
    }

    #[test]
    fn stay_dates_rejects_empty_range() {
        assert!(StayDates::new(date(2026, 3, 1), date(2026, 3, 1)).is_none());
        assert!(StayDates::new(date(2026, 3, 2), date(2026, 3, 1)).is_none());
    }

    #[test]
    fn stay_dates_iterates_nights_exclusive_of_checkout() {
        let stay = StayDates::new(date(2026, 2, 27), date(2026, 3, 2)).unwrap();
        let nights: Vec<_> = stay.each_night().collect();
        assert_eq!(stay.nights(), 3);
        assert_eq!(
            nights,
            vec![date(2026, 2, 27), date(2026, 2, 28), date(2026, 3, 1)]
        );
    }
}
