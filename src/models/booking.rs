use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Allowed edges of the booking state machine. `cancelled` and
    /// `completed` are terminal.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled) | (Confirmed, Completed)
        )
    }

    /// Pending and confirmed bookings keep their seats occupied.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: i64,
    pub booking_code: String,
    pub user_id: i64,
    pub showtime_id: i64,
    pub reservation_token: Uuid,
    pub seat_count: i32,
    /// Showtime price at the moment of booking.
    pub default_price_per_seat: i64,
    /// Price actually charged per seat; differs from the default only on a manual override.
    pub price_per_seat: i64,
    pub total_price: i64,
    pub price_override_note: Option<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_price_overridden(&self) -> bool {
        self.price_per_seat != self.default_price_per_seat || self.price_override_note.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking_code: String,
    pub user_id: i64,
    pub showtime_id: i64,
    pub reservation_token: Uuid,
    pub seat_count: i32,
    pub default_price_per_seat: i64,
    pub price_per_seat: i64,
    pub total_price: i64,
    pub price_override_note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    pub user_id: Option<i64>,
    pub showtime_id: Option<i64>,
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.user_id.map_or(true, |id| booking.user_id == id)
            && self.showtime_id.map_or(true, |id| booking.showtime_id == id)
            && self.status.map_or(true, |s| booking.status == s)
    }
}
