//! Seat reservation ledger: the authoritative record of which seats of a
//! showtime are held or booked.
//!
//! A reservation is identified by an opaque token. `reserve` claims every
//! requested seat or none; holds expire after a bounded duration and are
//! released either lazily by the next `reserve` touching the seat or by the
//! background sweep.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::SeatMapCache;
use crate::clock::Clock;
use crate::error::BookingError;
use crate::models::{BookingSeat, ExpiredHold, NewHold, SeatAvailability, SeatHoldState, SeatMapEntry};
use crate::store::{normalize_seat_ids, Store};

/// Upper bound for a client-requested hold.
pub const MAX_HOLD_SECS: i64 = 30 * 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReservationToken {
    pub token: Uuid,
    pub showtime_id: i64,
    pub seat_ids: Vec<i64>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SeatReservationLedger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    cache: SeatMapCache,
    default_hold: Duration,
}

impl SeatReservationLedger {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, cache: SeatMapCache, default_hold: Duration) -> Self {
        Self {
            store,
            clock,
            cache,
            default_hold,
        }
    }

    pub fn default_hold(&self) -> Duration {
        self.default_hold
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn hold_duration(&self, requested: Option<Duration>) -> Result<Duration, BookingError> {
        let hold = requested.unwrap_or(self.default_hold);
        if hold <= Duration::zero() || hold > Duration::seconds(MAX_HOLD_SECS) {
            return Err(BookingError::Validation(format!(
                "hold duration must be between 1 and {MAX_HOLD_SECS} seconds, got {}",
                hold.num_seconds()
            )));
        }
        Ok(hold)
    }

    /// Claims `seat_ids` for the showtime under a fresh token.
    pub async fn reserve(
        &self,
        showtime_id: i64,
        seat_ids: &[i64],
        hold: Option<Duration>,
    ) -> Result<ReservationToken, BookingError> {
        let seat_ids = normalize_seat_ids(seat_ids)?;
        let hold = self.hold_duration(hold)?;
        let now = self.clock.now();
        let token = Uuid::new_v4();
        let expires_at = now + hold;

        let rows = match self
            .store
            .hold_seats(NewHold {
                reservation_token: token,
                showtime_id,
                seat_ids: seat_ids.clone(),
                expires_at,
                now,
            })
            .await
        {
            Ok(rows) => rows,
            Err(e @ BookingError::SeatConflict { .. }) => {
                warn!("Seat conflict on showtime {}: {}", showtime_id, e);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.cache.invalidate(showtime_id).await;
        info!(
            "Held {} seat(s) for showtime {} under {} until {}",
            rows.len(),
            showtime_id,
            token,
            expires_at
        );
        Ok(ReservationToken {
            token,
            showtime_id,
            seat_ids,
            expires_at,
        })
    }

    /// Turns a live hold into confirmed seats. Repeating it on an already
    /// confirmed token returns the same rows.
    pub async fn confirm(&self, token: Uuid) -> Result<Vec<BookingSeat>, BookingError> {
        let rows = self.store.confirm_hold(token, self.clock.now()).await?;
        if let Some(showtime_id) = rows.first().map(|r| r.showtime_id) {
            self.cache.invalidate(showtime_id).await;
        }
        debug!("Confirmed {} seat(s) of reservation {}", rows.len(), token);
        Ok(rows)
    }

    /// Frees every active seat of the token. Releasing twice is a no-op.
    pub async fn release(&self, token: Uuid) -> Result<usize, BookingError> {
        let released = self.store.release_hold(token).await?;
        if let Some(showtime_id) = released.first().map(|r| r.showtime_id) {
            self.cache.invalidate(showtime_id).await;
            info!("Released {} seat(s) of reservation {}", released.len(), token);
        }
        Ok(released.len())
    }

    /// Customer abandoning checkout. Tokens already bound to a booking must
    /// go through the booking lifecycle instead.
    pub async fn abandon(&self, token: Uuid) -> Result<usize, BookingError> {
        let rows = self.store.hold_rows(token).await?;
        if rows.is_empty() {
            return Err(BookingError::not_found("reservation", token));
        }
        if rows.iter().any(|r| r.booking_id.is_some()) {
            return Err(BookingError::in_use("reservation", token, "a booking"));
        }
        self.release(token).await
    }

    /// Releases holds expired at `now` and cancels their pending bookings.
    pub async fn expire_stale_holds(&self, now: DateTime<Utc>) -> Result<Vec<ExpiredHold>, BookingError> {
        let expired = self.store.expire_holds(now).await?;
        let mut showtimes: Vec<i64> = expired.iter().map(|h| h.showtime_id).collect();
        showtimes.sort_unstable();
        showtimes.dedup();
        for showtime_id in showtimes {
            self.cache.invalidate(showtime_id).await;
        }
        for hold in &expired {
            match hold.booking_id {
                Some(booking_id) => info!(
                    "⏰ Hold {} expired: {} seat(s) released, booking {} cancelled",
                    hold.reservation_token,
                    hold.seat_ids.len(),
                    booking_id
                ),
                None => info!(
                    "⏰ Hold {} expired: {} seat(s) released",
                    hold.reservation_token,
                    hold.seat_ids.len()
                ),
            }
        }
        Ok(expired)
    }

    /// Active rows (held or confirmed) of the showtime.
    pub async fn occupancy(&self, showtime_id: i64) -> Result<Vec<BookingSeat>, BookingError> {
        self.store.showtime_seats(showtime_id, true).await
    }

    pub async fn hold(&self, token: Uuid) -> Result<Vec<BookingSeat>, BookingError> {
        let rows = self.store.hold_rows(token).await?;
        if rows.is_empty() {
            return Err(BookingError::not_found("reservation", token));
        }
        Ok(rows)
    }

    /// Every seat of the showtime's studio with its current availability.
    /// Held rows past their expiry already count as available.
    pub async fn seat_map(&self, showtime_id: i64) -> Result<Vec<SeatMapEntry>, BookingError> {
        if let Some(cached) = self.cache.get(showtime_id).await {
            return Ok(cached);
        }

        let showtime = self
            .store
            .get_showtime(showtime_id)
            .await?
            .ok_or_else(|| BookingError::not_found("showtime", showtime_id))?;
        let seats = self.store.list_seats(showtime.studio_id).await?;
        let now = self.clock.now();

        let occupied: HashMap<i64, SeatAvailability> = self
            .occupancy(showtime_id)
            .await?
            .into_iter()
            .filter(|r| r.is_active_at(now))
            .map(|r| {
                let status = if r.state == SeatHoldState::Confirmed {
                    SeatAvailability::Booked
                } else {
                    SeatAvailability::Held
                };
                (r.seat_id, status)
            })
            .collect();

        let map: Vec<SeatMapEntry> = seats
            .into_iter()
            .map(|seat| SeatMapEntry {
                status: occupied.get(&seat.id).copied().unwrap_or(SeatAvailability::Available),
                seat_id: seat.id,
                label: seat.label,
                row_label: seat.row_label,
                number: seat.number,
            })
            .collect();

        self.cache.put(showtime_id, &map).await;
        Ok(map)
    }

    pub async fn invalidate(&self, showtime_id: i64) {
        self.cache.invalidate(showtime_id).await;
    }
}
