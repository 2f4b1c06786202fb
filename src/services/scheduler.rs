//! Showtime scheduling: binds a movie to a studio time slot and keeps
//! showtimes of one studio and date from overlapping.

use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::BookingError;
use crate::models::{NewShowtime, Showtime, ShowtimeFilter};
use crate::store::{DeletedShowtime, Store};

/// First showtime of `existing` on the same studio and date whose
/// `[start, end)` window intersects the candidate's. `exclude` skips the
/// showtime being rescheduled.
pub fn find_conflict<'a>(
    existing: impl IntoIterator<Item = &'a Showtime>,
    candidate: &NewShowtime,
    exclude: Option<i64>,
) -> Option<&'a Showtime> {
    existing.into_iter().find(|s| {
        Some(s.id) != exclude
            && s.studio_id == candidate.studio_id
            && s.show_date == candidate.show_date
            && s.overlaps(candidate.start_time, candidate.end_time)
    })
}

pub fn conflict_error(existing: &Showtime) -> BookingError {
    BookingError::ScheduleConflict {
        conflicting_id: existing.id,
        start: existing.start_time,
        end: existing.end_time,
    }
}

/// `start < end` and a non-negative price.
pub fn validate_slot(start: NaiveTime, end: NaiveTime, price: i64) -> Result<(), BookingError> {
    if start >= end {
        return Err(BookingError::InvalidTimeRange { start, end });
    }
    if price < 0 {
        return Err(BookingError::InvalidPrice(format!("ticket price must not be negative, got {price}")));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ShowtimeScheduler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl ShowtimeScheduler {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn schedule(
        &self,
        movie_id: i64,
        studio_id: i64,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        price: i64,
    ) -> Result<Showtime, BookingError> {
        validate_slot(start, end, price)?;
        let candidate = NewShowtime {
            movie_id,
            studio_id,
            show_date: date,
            start_time: start,
            end_time: end,
            price,
        };

        match self.store.insert_showtime(candidate).await {
            Ok(showtime) => {
                info!(
                    "Scheduled showtime {} (movie {}, studio {}) on {} {}-{}",
                    showtime.id, movie_id, studio_id, date, start, end
                );
                Ok(showtime)
            }
            Err(e @ BookingError::ScheduleConflict { .. }) => {
                warn!("Rejected showtime for studio {} on {} {}-{}: {}", studio_id, date, start, end, e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn reschedule(&self, id: i64, update: NewShowtime) -> Result<Showtime, BookingError> {
        validate_slot(update.start_time, update.end_time, update.price)?;
        let showtime = self.store.update_showtime(id, update, self.clock.now()).await?;
        info!(
            "Rescheduled showtime {} to studio {} on {} {}-{}",
            showtime.id, showtime.studio_id, showtime.show_date, showtime.start_time, showtime.end_time
        );
        Ok(showtime)
    }

    /// Deletes a showtime. With `force`, active bookings are cancelled and
    /// their seats released first.
    pub async fn cancel_showtime(&self, id: i64, force: bool) -> Result<DeletedShowtime, BookingError> {
        let deleted = self.store.delete_showtime(id, force, self.clock.now()).await?;
        if deleted.cancelled_bookings.is_empty() {
            info!("Showtime {} deleted", id);
        } else {
            let codes: Vec<&str> = deleted.cancelled_bookings.iter().map(|b| b.booking_code.as_str()).collect();
            warn!("Showtime {} force-deleted, cancelled bookings {:?}", id, codes);
        }
        Ok(deleted)
    }

    pub async fn get(&self, id: i64) -> Result<Showtime, BookingError> {
        self.store
            .get_showtime(id)
            .await?
            .ok_or_else(|| BookingError::not_found("showtime", id))
    }

    pub async fn list(&self, filter: &ShowtimeFilter) -> Result<Vec<Showtime>, BookingError> {
        self.store.list_showtimes(filter).await
    }
}
