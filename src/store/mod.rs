//! Persistence seam of the booking core.
//!
//! Every method that must be atomic (overlap check + insert, seat
//! check + hold, status compare-and-set + seat release) is a single call
//! here, so each backend can run it inside one transaction or critical
//! section. Domain rules stay in `services`; backends call the pure helpers
//! from there (`scheduler::find_conflict`, `pricing::compute_total`).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::*;
use crate::services::layout::StudioLayout;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, BookingError>;

/// Result of a forced or plain showtime deletion.
#[derive(Debug, Clone, Default)]
pub struct DeletedShowtime {
    pub cancelled_bookings: Vec<Booking>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // === Users ===
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    // === Studios & seats ===
    /// Inserts the studio and its full seat inventory together.
    async fn insert_studio(&self, studio: NewStudio, seats: Vec<SeatSpec>) -> StoreResult<(Studio, Vec<Seat>)>;
    async fn get_studio(&self, id: i64) -> StoreResult<Option<Studio>>;
    async fn list_studios(&self) -> StoreResult<Vec<Studio>>;
    async fn rename_studio(&self, id: i64, name: String) -> StoreResult<Studio>;
    /// Replaces rows/columns and the seat inventory. Fails with
    /// `ResourceInUse` once any showtime references the studio.
    async fn replace_layout(
        &self,
        id: i64,
        layout: StudioLayout,
        seats: Vec<SeatSpec>,
    ) -> StoreResult<(Studio, Vec<Seat>)>;
    async fn delete_studio(&self, id: i64) -> StoreResult<()>;
    async fn list_seats(&self, studio_id: i64) -> StoreResult<Vec<Seat>>;

    // === Movies ===
    async fn insert_movie(&self, movie: MovieInput) -> StoreResult<Movie>;
    async fn get_movie(&self, id: i64) -> StoreResult<Option<Movie>>;
    async fn list_movies(&self, status: Option<MovieStatus>) -> StoreResult<Vec<Movie>>;
    async fn update_movie(&self, id: i64, movie: MovieInput) -> StoreResult<Movie>;
    async fn delete_movie(&self, id: i64) -> StoreResult<()>;

    // === Showtimes ===
    /// Overlap check and insert, serialized per studio.
    async fn insert_showtime(&self, showtime: NewShowtime) -> StoreResult<Showtime>;
    /// Same check as insert, ignoring the showtime being modified. Holds
    /// live at `now` pin the showtime to its studio.
    async fn update_showtime(&self, id: i64, showtime: NewShowtime, now: DateTime<Utc>) -> StoreResult<Showtime>;
    async fn get_showtime(&self, id: i64) -> StoreResult<Option<Showtime>>;
    async fn list_showtimes(&self, filter: &ShowtimeFilter) -> StoreResult<Vec<Showtime>>;
    /// Refuses with `ShowtimeHasBookings` while active bookings exist unless
    /// `force`, in which case they are cancelled first.
    async fn delete_showtime(&self, id: i64, force: bool, now: DateTime<Utc>) -> StoreResult<DeletedShowtime>;

    // === Seat ledger ===
    /// All-or-nothing claim of `hold.seat_ids` for the showtime.
    async fn hold_seats(&self, hold: NewHold) -> StoreResult<Vec<BookingSeat>>;
    async fn hold_rows(&self, token: Uuid) -> StoreResult<Vec<BookingSeat>>;
    /// `held -> confirmed` for every row of the token; idempotent.
    async fn confirm_hold(&self, token: Uuid, now: DateTime<Utc>) -> StoreResult<Vec<BookingSeat>>;
    /// Frees every active row of the token; returns the rows it changed.
    async fn release_hold(&self, token: Uuid) -> StoreResult<Vec<BookingSeat>>;
    /// Releases held rows expired at `now` and cancels their pending bookings.
    async fn expire_holds(&self, now: DateTime<Utc>) -> StoreResult<Vec<ExpiredHold>>;
    async fn showtime_seats(&self, showtime_id: i64, active_only: bool) -> StoreResult<Vec<BookingSeat>>;
    async fn booking_seats(&self, booking_id: i64) -> StoreResult<Vec<BookingSeat>>;

    // === Bookings ===
    async fn booking_code_exists(&self, code: &str) -> StoreResult<bool>;
    /// Inserts the booking and binds the token's live, unbound hold to it.
    /// `HoldExpired` if the hold is gone, `DuplicateBookingCode` on a code race.
    async fn insert_booking(&self, booking: NewBooking, now: DateTime<Utc>) -> StoreResult<Booking>;
    async fn get_booking(&self, id: i64) -> StoreResult<Option<Booking>>;
    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>>;
    /// Compare-and-set of the status together with the matching seat-row
    /// change. `InvalidTransition` when the stored status is no longer `from`.
    async fn transition_booking(
        &self,
        id: i64,
        from: BookingStatus,
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<Booking>;
    /// Claims extra seats for an active booking and recomputes its totals.
    async fn add_booking_seats(
        &self,
        booking_id: i64,
        seat_ids: Vec<i64>,
        now: DateTime<Utc>,
    ) -> StoreResult<(Booking, Vec<BookingSeat>)>;
    async fn delete_booking(&self, id: i64) -> StoreResult<Booking>;
    /// Marks confirmed bookings whose showtime ended at or before `now` as completed.
    async fn complete_finished(&self, now: NaiveDateTime) -> StoreResult<Vec<Booking>>;
}

/// Sorted, de-duplicated seat ids; empty requests are rejected.
pub fn normalize_seat_ids(seat_ids: &[i64]) -> Result<Vec<i64>, BookingError> {
    let mut ids = seat_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Err(BookingError::InvalidSeatCount(0));
    }
    Ok(ids)
}
