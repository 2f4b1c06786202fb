use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Ledger state of a single seat claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seat_hold_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SeatHoldState {
    Held,
    Confirmed,
    Released,
    Completed,
}

impl SeatHoldState {
    pub fn is_active(self) -> bool {
        matches!(self, SeatHoldState::Held | SeatHoldState::Confirmed)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct BookingSeat {
    pub id: i64,
    pub reservation_token: Uuid,
    pub booking_id: Option<i64>,
    pub showtime_id: i64,
    pub seat_id: i64,
    pub state: SeatHoldState,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BookingSeat {
    /// Active claim at `now`. A `held` row past its expiry no longer blocks
    /// the seat even before a sweep releases it.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            SeatHoldState::Confirmed => true,
            SeatHoldState::Held => self.expires_at.map_or(true, |exp| exp > now),
            _ => false,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.state == SeatHoldState::Held && self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Atomic claim request handed to the store.
#[derive(Debug, Clone)]
pub struct NewHold {
    pub reservation_token: Uuid,
    pub showtime_id: i64,
    /// Sorted and de-duplicated.
    pub seat_ids: Vec<i64>,
    pub expires_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

/// A hold released by expiry, with the pending booking it cancelled (if any).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExpiredHold {
    pub reservation_token: Uuid,
    pub showtime_id: i64,
    pub booking_id: Option<i64>,
    pub seat_ids: Vec<i64>,
}
