//! Booking lifecycle: `pending -> confirmed -> completed`, with
//! cancellation from either active state.
//!
//! Seats always move through the ledger; the booking row only records who
//! holds them, at which price and under which code.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::BookingError;
use crate::models::{Booking, BookingFilter, BookingSeat, BookingStatus, NewBooking, Showtime};
use crate::services::booking_code::BookingCodeGenerator;
use crate::services::ledger::SeatReservationLedger;
use crate::services::pricing::{PriceOverride, PriceQuote, PricingCalculator};
use crate::store::{normalize_seat_ids, Store};

#[derive(Debug, Clone, Default)]
pub struct CreateBooking {
    pub user_id: i64,
    pub showtime_id: i64,
    /// Seats to reserve. With `reservation_token` set, either empty or the
    /// exact seats of that hold.
    pub seat_ids: Vec<i64>,
    pub reservation_token: Option<Uuid>,
    pub price_override: Option<PriceOverride>,
    pub client_total: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub seats: Vec<BookingSeat>,
    /// When the pending booking is cancelled unless confirmed.
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub client_total_matched: bool,
}

#[derive(Clone)]
pub struct BookingLifecycle {
    store: Arc<dyn Store>,
    ledger: SeatReservationLedger,
    pricing: PricingCalculator,
    codes: Arc<BookingCodeGenerator>,
    clock: Arc<dyn Clock>,
}

impl BookingLifecycle {
    pub fn new(
        store: Arc<dyn Store>,
        ledger: SeatReservationLedger,
        codes: Arc<BookingCodeGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            pricing: PricingCalculator::new(),
            codes,
            clock,
        }
    }

    pub fn ledger(&self) -> &SeatReservationLedger {
        &self.ledger
    }

    pub async fn create_booking(&self, req: CreateBooking) -> Result<BookingReceipt, BookingError> {
        if self.store.get_user(req.user_id).await?.is_none() {
            return Err(BookingError::not_found("user", req.user_id));
        }
        let showtime = self
            .store
            .get_showtime(req.showtime_id)
            .await?
            .ok_or_else(|| BookingError::not_found("showtime", req.showtime_id))?;

        let (token, seat_count, owns_hold) = match req.reservation_token {
            Some(token) => {
                let rows = self.ledger.hold(token).await?;
                let mut held: Vec<i64> = rows.iter().map(|r| r.seat_id).collect();
                held.sort_unstable();
                if !req.seat_ids.is_empty() && normalize_seat_ids(&req.seat_ids)? != held {
                    return Err(BookingError::Validation(format!(
                        "seat_ids do not match the seats held by reservation {token}"
                    )));
                }
                (token, held.len(), false)
            }
            None => {
                let hold = self.ledger.reserve(req.showtime_id, &req.seat_ids, None).await?;
                (hold.token, hold.seat_ids.len(), true)
            }
        };

        match self.persist(&req, &showtime, token, seat_count).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                // Отпускаем места, если бронь так и не создалась
                if owns_hold {
                    if let Err(release_err) = self.ledger.release(token).await {
                        error!("Failed to release hold {} after booking error: {}", token, release_err);
                    }
                }
                Err(e)
            }
        }
    }

    async fn persist(
        &self,
        req: &CreateBooking,
        showtime: &Showtime,
        token: Uuid,
        seat_count: usize,
    ) -> Result<BookingReceipt, BookingError> {
        let quote = self
            .pricing
            .quote(seat_count, showtime.price, req.price_override.as_ref())?;
        let client_total_matched = self.pricing.check_client_total(&quote, req.client_total);

        let booking = self.insert_with_unique_code(req, &quote, token).await?;
        let seats = self.store.booking_seats(booking.id).await?;
        let hold_expires_at = seats.iter().filter_map(|s| s.expires_at).min();

        info!(
            "🎫 Booking {} created: user {}, showtime {}, {} seat(s), total {}",
            booking.booking_code, booking.user_id, booking.showtime_id, booking.seat_count, booking.total_price
        );
        Ok(BookingReceipt {
            booking,
            seats,
            hold_expires_at,
            client_total_matched,
        })
    }

    // Код проверяется заранее, но уникальный индекс может выстрелить при гонке
    async fn insert_with_unique_code(
        &self,
        req: &CreateBooking,
        quote: &PriceQuote,
        token: Uuid,
    ) -> Result<Booking, BookingError> {
        let attempts = self.codes.max_attempts();
        for _ in 0..attempts {
            let store = self.store.clone();
            let code = self
                .codes
                .generate(move |code| {
                    let store = store.clone();
                    async move { store.booking_code_exists(&code).await }
                })
                .await?;

            let new_booking = NewBooking {
                booking_code: code,
                user_id: req.user_id,
                showtime_id: req.showtime_id,
                reservation_token: token,
                seat_count: quote.seat_count,
                default_price_per_seat: quote.default_price_per_seat,
                price_per_seat: quote.price_per_seat,
                total_price: quote.total,
                price_override_note: quote.override_note.clone(),
            };
            match self.store.insert_booking(new_booking, self.clock.now()).await {
                Err(BookingError::DuplicateBookingCode(code)) => {
                    warn!("Booking code {} taken concurrently, retrying", code);
                }
                other => return other,
            }
        }
        Err(BookingError::CodeGenerationExhausted { attempts })
    }

    /// `pending -> confirmed`. An expired hold cancels the booking and
    /// reports `HoldExpired`.
    pub async fn confirm_booking(&self, id: i64) -> Result<Booking, BookingError> {
        let booking = self.get(id).await?;
        if booking.status != BookingStatus::Pending {
            return Err(self.rejected(&booking, BookingStatus::Confirmed));
        }

        // Статус и места подтверждаются в одной транзакции
        let result = self
            .store
            .transition_booking(id, BookingStatus::Pending, BookingStatus::Confirmed, self.clock.now())
            .await;
        match result {
            Ok(confirmed) => {
                self.ledger.invalidate(confirmed.showtime_id).await;
                info!("✅ Booking {} confirmed", confirmed.booking_code);
                Ok(confirmed)
            }
            Err(BookingError::HoldExpired(token)) => {
                self.cancel_expired(&booking).await;
                Err(BookingError::HoldExpired(token))
            }
            Err(e) => Err(e),
        }
    }

    async fn cancel_expired(&self, booking: &Booking) {
        let result = self
            .store
            .transition_booking(booking.id, BookingStatus::Pending, BookingStatus::Cancelled, self.clock.now())
            .await;
        match result {
            Ok(_) => {
                self.ledger.invalidate(booking.showtime_id).await;
                warn!("⏰ Booking {} cancelled: hold expired before confirmation", booking.booking_code);
            }
            Err(BookingError::InvalidTransition { .. }) => {}
            Err(e) => error!("Failed to cancel expired booking {}: {}", booking.booking_code, e),
        }
    }

    /// Frees the seats immediately; allowed from `pending` or `confirmed`.
    pub async fn cancel_booking(&self, id: i64) -> Result<Booking, BookingError> {
        let booking = self.get(id).await?;
        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(self.rejected(&booking, BookingStatus::Cancelled));
        }

        let cancelled = self
            .store
            .transition_booking(id, booking.status, BookingStatus::Cancelled, self.clock.now())
            .await?;
        self.ledger.invalidate(cancelled.showtime_id).await;
        info!("❌ Booking {} cancelled (was {})", cancelled.booking_code, booking.status);
        Ok(cancelled)
    }

    /// `confirmed -> completed`, only once the showtime has ended. Completed
    /// rows no longer occupy their seats.
    pub async fn complete_booking(&self, id: i64) -> Result<Booking, BookingError> {
        let booking = self.get(id).await?;
        if booking.status != BookingStatus::Confirmed {
            return Err(self.rejected(&booking, BookingStatus::Completed));
        }
        let showtime = self
            .store
            .get_showtime(booking.showtime_id)
            .await?
            .ok_or_else(|| BookingError::not_found("showtime", booking.showtime_id))?;
        let now = self.clock.now();
        if showtime.ends_at() > now.naive_utc() {
            warn!(
                "Refused to complete booking {}: showtime {} ends at {}",
                booking.booking_code,
                showtime.id,
                showtime.ends_at()
            );
            return Err(BookingError::ShowtimeNotEnded {
                showtime_id: showtime.id,
                ends_at: showtime.ends_at(),
            });
        }

        let completed = self
            .store
            .transition_booking(id, BookingStatus::Confirmed, BookingStatus::Completed, now)
            .await?;
        self.ledger.invalidate(completed.showtime_id).await;
        info!("Booking {} completed", completed.booking_code);
        Ok(completed)
    }

    /// Single entry point for status changes requested over the API.
    pub async fn transition(&self, id: i64, to: BookingStatus) -> Result<Booking, BookingError> {
        match to {
            BookingStatus::Confirmed => self.confirm_booking(id).await,
            BookingStatus::Cancelled => self.cancel_booking(id).await,
            BookingStatus::Completed => self.complete_booking(id).await,
            BookingStatus::Pending => {
                let booking = self.get(id).await?;
                Err(self.rejected(&booking, BookingStatus::Pending))
            }
        }
    }

    fn rejected(&self, booking: &Booking, to: BookingStatus) -> BookingError {
        warn!(
            "Rejected transition of booking {}: {} -> {}",
            booking.booking_code, booking.status, to
        );
        BookingError::InvalidTransition { from: booking.status, to }
    }

    /// Administrative seat addition; totals are recomputed with the
    /// booking's effective per-seat price.
    pub async fn add_seats(&self, booking_id: i64, seat_ids: &[i64]) -> Result<(Booking, Vec<BookingSeat>), BookingError> {
        let (booking, added) = self
            .store
            .add_booking_seats(booking_id, seat_ids.to_vec(), self.clock.now())
            .await?;
        self.ledger.invalidate(booking.showtime_id).await;
        info!(
            "Added {} seat(s) to booking {}: now {} seat(s), total {}",
            added.len(),
            booking.booking_code,
            booking.seat_count,
            booking.total_price
        );
        Ok((booking, added))
    }

    /// Administrative hard delete of the booking and its seat rows.
    pub async fn delete_booking(&self, id: i64) -> Result<Booking, BookingError> {
        let deleted = self.store.delete_booking(id).await?;
        self.ledger.invalidate(deleted.showtime_id).await;
        warn!("🗑️ Booking {} ({}) deleted", deleted.booking_code, deleted.status);
        Ok(deleted)
    }

    /// Completes confirmed bookings whose showtime ended by `now`.
    pub async fn complete_finished(&self, now: DateTime<Utc>) -> Result<Vec<Booking>, BookingError> {
        let completed = self.store.complete_finished(now.naive_utc()).await?;
        for booking in &completed {
            self.ledger.invalidate(booking.showtime_id).await;
        }
        Ok(completed)
    }

    pub async fn get(&self, id: i64) -> Result<Booking, BookingError> {
        self.store
            .get_booking(id)
            .await?
            .ok_or_else(|| BookingError::not_found("booking", id))
    }

    pub async fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>, BookingError> {
        self.store.list_bookings(filter).await
    }

    pub async fn seats(&self, id: i64) -> Result<Vec<BookingSeat>, BookingError> {
        self.store.booking_seats(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SeatMapCache;
    use crate::clock::ManualClock;
    use crate::models::{MovieInput, MovieStatus, NewShowtime, NewStudio, NewUser, SeatHoldState, UserRole};
    use crate::services::layout::StudioLayout;
    use crate::store::MemoryStore;
    use chrono::{Duration, NaiveDate, NaiveTime, TimeZone};

    struct Fixture {
        lifecycle: BookingLifecycle,
        store: Arc<dyn Store>,
        clock: Arc<ManualClock>,
        user_id: i64,
        showtime_id: i64,
        seats: Vec<i64>,
    }

    async fn fixture_with_codes(codes: BookingCodeGenerator) -> Fixture {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let user = store
            .insert_user(NewUser {
                name: "Aigerim".into(),
                email: "aigerim@example.com".into(),
                password_hash: "x".into(),
                role: UserRole::User,
            })
            .await
            .unwrap();
        let layout = StudioLayout::new(2, 3, Some(6)).unwrap();
        let (studio, seats) = store
            .insert_studio(
                NewStudio {
                    name: "Hall 1".into(),
                    row_count: 2,
                    seats_per_row: 3,
                    total_seats: 6,
                },
                layout.seats(),
            )
            .await
            .unwrap();
        let movie = store
            .insert_movie(MovieInput {
                title: "Arrival".into(),
                genre: "drama".into(),
                duration_minutes: 116,
                rating: "PG-13".into(),
                status: MovieStatus::NowPlaying,
                release_date: None,
            })
            .await
            .unwrap();
        let showtime = store
            .insert_showtime(NewShowtime {
                movie_id: movie.id,
                studio_id: studio.id,
                show_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
                price: 50_000,
            })
            .await
            .unwrap();

        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap()));
        let ledger = SeatReservationLedger::new(
            store.clone(),
            clock.clone(),
            SeatMapCache::disabled(),
            Duration::seconds(300),
        );
        let lifecycle = BookingLifecycle::new(store.clone(), ledger, Arc::new(codes), clock.clone());
        Fixture {
            lifecycle,
            store,
            clock,
            user_id: user.id,
            showtime_id: showtime.id,
            seats: seats.iter().map(|s| s.id).collect(),
        }
    }

    async fn fixture() -> Fixture {
        fixture_with_codes(BookingCodeGenerator::default()).await
    }

    fn request(f: &Fixture, seats: &[i64]) -> CreateBooking {
        CreateBooking {
            user_id: f.user_id,
            showtime_id: f.showtime_id,
            seat_ids: seats.to_vec(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_prices_and_holds() {
        let f = fixture().await;
        let mut req = request(&f, &f.seats[..3]);
        req.client_total = Some(1);
        let receipt = f.lifecycle.create_booking(req).await.unwrap();

        assert_eq!(receipt.booking.status, BookingStatus::Pending);
        assert_eq!(receipt.booking.seat_count, 3);
        assert_eq!(receipt.booking.total_price, 150_000);
        assert!(!receipt.client_total_matched);
        assert_eq!(receipt.seats.len(), 3);
        assert!(receipt.seats.iter().all(|s| s.state == SeatHoldState::Held));
        assert_eq!(receipt.hold_expires_at, Some(f.clock.now() + Duration::seconds(300)));
    }

    #[tokio::test]
    async fn test_price_override_is_recorded() {
        let f = fixture().await;
        let mut req = request(&f, &f.seats[..2]);
        req.price_override = Some(PriceOverride {
            price_per_seat: 30_000,
            note: Some("staff discount".into()),
        });
        let booking = f.lifecycle.create_booking(req).await.unwrap().booking;
        assert_eq!(booking.default_price_per_seat, 50_000);
        assert_eq!(booking.price_per_seat, 30_000);
        assert_eq!(booking.total_price, 60_000);
        assert!(booking.is_price_overridden());
    }

    #[tokio::test]
    async fn test_unknown_user_or_showtime() {
        let f = fixture().await;
        let mut req = request(&f, &f.seats[..1]);
        req.user_id = 999;
        assert!(matches!(
            f.lifecycle.create_booking(req).await,
            Err(BookingError::NotFound { resource: "user", .. })
        ));

        let mut req = request(&f, &f.seats[..1]);
        req.showtime_id = 999;
        assert!(matches!(
            f.lifecycle.create_booking(req).await,
            Err(BookingError::NotFound { resource: "showtime", .. })
        ));
    }

    #[tokio::test]
    async fn test_hold_released_when_code_generation_fails() {
        let f = fixture_with_codes(BookingCodeGenerator::with_source(2, || 7)).await;
        f.lifecycle.create_booking(request(&f, &f.seats[..1])).await.unwrap();

        // every candidate is now BK000007, which is taken
        let err = f.lifecycle.create_booking(request(&f, &f.seats[1..2])).await.unwrap_err();
        assert!(matches!(err, BookingError::CodeGenerationExhausted { attempts: 2 }));

        let active = f.store.showtime_seats(f.showtime_id, true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].seat_id, f.seats[0]);
    }

    #[tokio::test]
    async fn test_booking_from_reservation_token() {
        let f = fixture().await;
        let hold = f
            .lifecycle
            .ledger()
            .reserve(f.showtime_id, &f.seats[..2], None)
            .await
            .unwrap();

        let mut mismatched = request(&f, &f.seats[..1]);
        mismatched.reservation_token = Some(hold.token);
        assert!(matches!(
            f.lifecycle.create_booking(mismatched).await,
            Err(BookingError::Validation(_))
        ));

        let mut req = request(&f, &[]);
        req.reservation_token = Some(hold.token);
        let receipt = f.lifecycle.create_booking(req.clone()).await.unwrap();
        assert_eq!(receipt.booking.reservation_token, hold.token);
        assert_eq!(receipt.booking.seat_count, 2);

        // a token binds to one booking only
        assert!(matches!(
            f.lifecycle.create_booking(req).await,
            Err(BookingError::ResourceInUse { .. })
        ));
    }

    #[tokio::test]
    async fn test_confirm_then_complete() {
        let f = fixture().await;
        let booking = f.lifecycle.create_booking(request(&f, &f.seats[..2])).await.unwrap().booking;

        let confirmed = f.lifecycle.confirm_booking(booking.id).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        let seats = f.lifecycle.seats(booking.id).await.unwrap();
        assert!(seats.iter().all(|s| s.state == SeatHoldState::Confirmed));

        let err = f.lifecycle.confirm_booking(booking.id).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidTransition { from: BookingStatus::Confirmed, to: BookingStatus::Confirmed }
        ));

        f.clock.set(Utc.with_ymd_and_hms(2030, 1, 1, 20, 0, 0).unwrap());
        let completed = f.lifecycle.complete_booking(booking.id).await.unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);
        assert!(f.lifecycle.cancel_booking(booking.id).await.is_err());
    }

    #[tokio::test]
    async fn test_complete_refused_before_showtime_ends() {
        let f = fixture().await;
        let booking = f.lifecycle.create_booking(request(&f, &f.seats[..1])).await.unwrap().booking;
        f.lifecycle.confirm_booking(booking.id).await.unwrap();

        // 12:00, show runs 18:00-20:00
        let err = f.lifecycle.complete_booking(booking.id).await.unwrap_err();
        assert!(matches!(err, BookingError::ShowtimeNotEnded { showtime_id, .. } if showtime_id == f.showtime_id));

        f.clock.set(Utc.with_ymd_and_hms(2030, 1, 1, 19, 59, 59).unwrap());
        assert!(matches!(
            f.lifecycle.transition(booking.id, BookingStatus::Completed).await,
            Err(BookingError::ShowtimeNotEnded { .. })
        ));

        // the seat stays sold for the upcoming show
        assert_eq!(f.lifecycle.get(booking.id).await.unwrap().status, BookingStatus::Confirmed);
        assert!(matches!(
            f.lifecycle.create_booking(request(&f, &f.seats[..1])).await,
            Err(BookingError::SeatConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_confirm_after_expiry_cancels() {
        let f = fixture().await;
        let booking = f.lifecycle.create_booking(request(&f, &f.seats[..1])).await.unwrap().booking;
        f.clock.advance(Duration::seconds(301));

        let err = f.lifecycle.confirm_booking(booking.id).await.unwrap_err();
        assert!(matches!(err, BookingError::HoldExpired(_)));
        assert_eq!(f.lifecycle.get(booking.id).await.unwrap().status, BookingStatus::Cancelled);

        // no row was confirmed on the way
        let seats = f.lifecycle.seats(booking.id).await.unwrap();
        assert!(seats.iter().all(|s| s.state == SeatHoldState::Released));
        f.lifecycle.create_booking(request(&f, &f.seats[..1])).await.unwrap();
    }

    #[tokio::test]
    async fn test_confirm_clears_expiry_of_every_row() {
        let f = fixture().await;
        let booking = f.lifecycle.create_booking(request(&f, &f.seats[..2])).await.unwrap().booking;
        f.lifecycle.confirm_booking(booking.id).await.unwrap();

        let seats = f.lifecycle.seats(booking.id).await.unwrap();
        assert!(seats.iter().all(|s| s.state == SeatHoldState::Confirmed && s.expires_at.is_none()));

        // confirmed seats survive the sweep long after the hold window
        f.clock.advance(Duration::hours(1));
        let expired = f.lifecycle.ledger().expire_stale_holds(f.clock.now()).await.unwrap();
        assert!(expired.is_empty());
        assert_eq!(f.lifecycle.get(booking.id).await.unwrap().status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_cancel_frees_seats_immediately() {
        let f = fixture().await;
        let booking = f.lifecycle.create_booking(request(&f, &f.seats[..2])).await.unwrap().booking;
        f.lifecycle.confirm_booking(booking.id).await.unwrap();

        assert!(matches!(
            f.lifecycle.create_booking(request(&f, &f.seats[1..3])).await,
            Err(BookingError::SeatConflict { .. })
        ));

        let cancelled = f.lifecycle.cancel_booking(booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        let seats = f.lifecycle.seats(booking.id).await.unwrap();
        assert!(seats.iter().all(|s| s.state == SeatHoldState::Released));
        f.lifecycle.create_booking(request(&f, &f.seats[1..3])).await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_is_not_a_target() {
        let f = fixture().await;
        let booking = f.lifecycle.create_booking(request(&f, &f.seats[..1])).await.unwrap().booking;
        assert!(matches!(
            f.lifecycle.transition(booking.id, BookingStatus::Pending).await,
            Err(BookingError::InvalidTransition { .. })
        ));
        assert!(matches!(
            f.lifecycle.complete_booking(booking.id).await,
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_add_seats_recomputes_total() {
        let f = fixture().await;
        let mut req = request(&f, &f.seats[..1]);
        req.price_override = Some(PriceOverride { price_per_seat: 40_000, note: None });
        let booking = f.lifecycle.create_booking(req).await.unwrap().booking;
        f.lifecycle.confirm_booking(booking.id).await.unwrap();

        let (updated, added) = f.lifecycle.add_seats(booking.id, &f.seats[1..3]).await.unwrap();
        assert_eq!(added.len(), 2);
        assert!(added.iter().all(|s| s.state == SeatHoldState::Confirmed));
        assert_eq!(updated.seat_count, 3);
        assert_eq!(updated.total_price, 120_000);

        f.lifecycle.cancel_booking(booking.id).await.unwrap();
        assert!(matches!(
            f.lifecycle.add_seats(booking.id, &f.seats[3..4]).await,
            Err(BookingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_booking_frees_seats() {
        let f = fixture().await;
        let booking = f.lifecycle.create_booking(request(&f, &f.seats[..1])).await.unwrap().booking;
        f.lifecycle.delete_booking(booking.id).await.unwrap();
        assert!(matches!(
            f.lifecycle.get(booking.id).await,
            Err(BookingError::NotFound { .. })
        ));
        f.lifecycle.create_booking(request(&f, &f.seats[..1])).await.unwrap();
    }

    #[tokio::test]
    async fn test_complete_finished() {
        let f = fixture().await;
        let booking = f.lifecycle.create_booking(request(&f, &f.seats[..1])).await.unwrap().booking;
        f.lifecycle.confirm_booking(booking.id).await.unwrap();

        let before_end = Utc.with_ymd_and_hms(2030, 1, 1, 19, 59, 0).unwrap();
        assert!(f.lifecycle.complete_finished(before_end).await.unwrap().is_empty());

        let at_end = Utc.with_ymd_and_hms(2030, 1, 1, 20, 0, 0).unwrap();
        let completed = f.lifecycle.complete_finished(at_end).await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].status, BookingStatus::Completed);
    }
}
