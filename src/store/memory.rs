//! In-memory backend. Every operation runs under one async mutex, which
//! makes each trait method a single critical section: the check-and-insert
//! of seats and showtimes cannot interleave with another caller.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{normalize_seat_ids, DeletedShowtime, Store, StoreResult};
use crate::error::BookingError;
use crate::models::*;
use crate::services::layout::StudioLayout;
use crate::services::pricing::compute_total;
use crate::services::scheduler::{conflict_error, find_conflict};

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct Tables {
    sequences: HashMap<&'static str, i64>,
    users: BTreeMap<i64, User>,
    studios: BTreeMap<i64, Studio>,
    seats: BTreeMap<i64, Seat>,
    movies: BTreeMap<i64, Movie>,
    showtimes: BTreeMap<i64, Showtime>,
    bookings: BTreeMap<i64, Booking>,
    booking_seats: BTreeMap<i64, BookingSeat>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i64 {
        let id = self.sequences.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn showtime(&self, id: i64) -> StoreResult<&Showtime> {
        self.showtimes.get(&id).ok_or_else(|| BookingError::not_found("showtime", id))
    }

    fn insert_seats(&mut self, studio_id: i64, specs: Vec<SeatSpec>) -> Vec<Seat> {
        let mut seats = Vec::with_capacity(specs.len());
        for spec in specs {
            let seat = Seat {
                id: self.next_id("seats"),
                studio_id,
                label: spec.label(),
                row_label: spec.row_label,
                number: spec.number,
            };
            self.seats.insert(seat.id, seat.clone());
            seats.push(seat);
        }
        seats
    }

    fn studio_seats(&self, studio_id: i64) -> Vec<Seat> {
        self.seats.values().filter(|s| s.studio_id == studio_id).cloned().collect()
    }

    fn studio_has_showtimes(&self, studio_id: i64) -> bool {
        self.showtimes.values().any(|s| s.studio_id == studio_id)
    }

    fn token_rows(&self, token: Uuid) -> Vec<BookingSeat> {
        self.booking_seats
            .values()
            .filter(|r| r.reservation_token == token)
            .cloned()
            .collect()
    }

    fn active_bookings(&self, showtime_id: i64) -> Vec<Booking> {
        self.bookings
            .values()
            .filter(|b| b.showtime_id == showtime_id && b.status.is_active())
            .cloned()
            .collect()
    }

    /// Releases the held rows of each token and cancels the pending booking
    /// bound to it. Rows that are already free are left alone.
    fn expire_tokens(&mut self, tokens: &BTreeSet<Uuid>, now: DateTime<Utc>) -> Vec<ExpiredHold> {
        let mut expired = Vec::new();
        for token in tokens {
            let mut seat_ids = Vec::new();
            let mut showtime_id = None;
            let mut booking_id = None;
            for row in self.booking_seats.values_mut().filter(|r| r.reservation_token == *token) {
                if row.state == SeatHoldState::Held {
                    row.state = SeatHoldState::Released;
                    seat_ids.push(row.seat_id);
                    showtime_id = Some(row.showtime_id);
                    booking_id = booking_id.or(row.booking_id);
                }
            }
            let Some(showtime_id) = showtime_id else { continue };

            if let Some(booking) = booking_id.and_then(|id| self.bookings.get_mut(&id)) {
                if booking.status == BookingStatus::Pending {
                    booking.status = BookingStatus::Cancelled;
                    booking.updated_at = now;
                }
            }
            seat_ids.sort_unstable();
            expired.push(ExpiredHold {
                reservation_token: *token,
                showtime_id,
                booking_id,
                seat_ids,
            });
        }
        expired
    }

    /// Seat check + insert for one showtime. Expired holds on the requested
    /// seats are swept first so they never block a new claim.
    fn claim_seats(
        &mut self,
        token: Uuid,
        showtime_id: i64,
        seat_ids: &[i64],
        booking_id: Option<i64>,
        state: SeatHoldState,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<BookingSeat>> {
        let studio_id = self.showtime(showtime_id)?.studio_id;
        for seat_id in seat_ids {
            match self.seats.get(seat_id) {
                Some(seat) if seat.studio_id == studio_id => {}
                _ => return Err(BookingError::not_found("seat", format!("{seat_id} in studio {studio_id}"))),
            }
        }

        let requested: BTreeSet<i64> = seat_ids.iter().copied().collect();
        let stale: BTreeSet<Uuid> = self
            .booking_seats
            .values()
            .filter(|r| r.showtime_id == showtime_id && requested.contains(&r.seat_id) && r.is_expired_at(now))
            .map(|r| r.reservation_token)
            .collect();
        if !stale.is_empty() {
            self.expire_tokens(&stale, now);
        }

        let mut taken: Vec<i64> = self
            .booking_seats
            .values()
            .filter(|r| r.showtime_id == showtime_id && requested.contains(&r.seat_id) && r.state.is_active())
            .map(|r| r.seat_id)
            .collect();
        if !taken.is_empty() {
            taken.sort_unstable();
            taken.dedup();
            return Err(BookingError::SeatConflict { showtime_id, seat_ids: taken });
        }

        let mut rows = Vec::with_capacity(seat_ids.len());
        for seat_id in seat_ids {
            let row = BookingSeat {
                id: self.next_id("booking_seats"),
                reservation_token: token,
                booking_id,
                showtime_id,
                seat_id: *seat_id,
                state,
                expires_at,
                created_at: now,
            };
            self.booking_seats.insert(row.id, row.clone());
            rows.push(row);
        }
        Ok(rows)
    }

    /// Seat-row side of a booking status change.
    fn apply_transition(&mut self, booking: &Booking, to: BookingStatus, now: DateTime<Utc>) -> StoreResult<()> {
        let rows = self
            .booking_seats
            .values_mut()
            .filter(|r| r.booking_id == Some(booking.id));
        match to {
            BookingStatus::Confirmed => {
                let rows: Vec<&mut BookingSeat> = rows.collect();
                if rows.iter().any(|r| r.is_expired_at(now) || !r.state.is_active()) {
                    return Err(BookingError::HoldExpired(booking.reservation_token));
                }
                for row in rows {
                    row.state = SeatHoldState::Confirmed;
                    row.expires_at = None;
                }
            }
            BookingStatus::Cancelled => {
                for row in rows.filter(|r| r.state.is_active()) {
                    row.state = SeatHoldState::Released;
                }
            }
            BookingStatus::Completed => {
                for row in rows.filter(|r| r.state == SeatHoldState::Confirmed) {
                    row.state = SeatHoldState::Completed;
                }
            }
            BookingStatus::Pending => {}
        }
        Ok(())
    }

    fn transition(&mut self, id: i64, from: BookingStatus, to: BookingStatus, now: DateTime<Utc>) -> StoreResult<Booking> {
        let booking = self
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| BookingError::not_found("booking", id))?;
        if booking.status != from {
            return Err(BookingError::InvalidTransition { from: booking.status, to });
        }
        if !from.can_transition_to(to) {
            return Err(BookingError::InvalidTransition { from, to });
        }

        self.apply_transition(&booking, to, now)?;

        let stored = self
            .bookings
            .get_mut(&id)
            .ok_or_else(|| BookingError::not_found("booking", id))?;
        stored.status = to;
        stored.updated_at = now;
        Ok(stored.clone())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut t = self.tables.lock().await;
        if t.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(BookingError::Validation(format!("email {} is already registered", user.email)));
        }
        let user = User {
            id: t.next_id("users"),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.tables.lock().await.users.values().cloned().collect())
    }

    async fn insert_studio(&self, studio: NewStudio, seats: Vec<SeatSpec>) -> StoreResult<(Studio, Vec<Seat>)> {
        let mut t = self.tables.lock().await;
        let studio = Studio {
            id: t.next_id("studios"),
            name: studio.name,
            row_count: studio.row_count,
            seats_per_row: studio.seats_per_row,
            total_seats: studio.total_seats,
            created_at: Utc::now(),
        };
        t.studios.insert(studio.id, studio.clone());
        let seats = t.insert_seats(studio.id, seats);
        Ok((studio, seats))
    }

    async fn get_studio(&self, id: i64) -> StoreResult<Option<Studio>> {
        Ok(self.tables.lock().await.studios.get(&id).cloned())
    }

    async fn list_studios(&self) -> StoreResult<Vec<Studio>> {
        Ok(self.tables.lock().await.studios.values().cloned().collect())
    }

    async fn rename_studio(&self, id: i64, name: String) -> StoreResult<Studio> {
        let mut t = self.tables.lock().await;
        let studio = t.studios.get_mut(&id).ok_or_else(|| BookingError::not_found("studio", id))?;
        studio.name = name;
        Ok(studio.clone())
    }

    async fn replace_layout(
        &self,
        id: i64,
        layout: StudioLayout,
        seats: Vec<SeatSpec>,
    ) -> StoreResult<(Studio, Vec<Seat>)> {
        let mut t = self.tables.lock().await;
        if !t.studios.contains_key(&id) {
            return Err(BookingError::not_found("studio", id));
        }
        if t.studio_has_showtimes(id) {
            return Err(BookingError::in_use("studio", id, "showtimes"));
        }
        t.seats.retain(|_, s| s.studio_id != id);
        let seats = t.insert_seats(id, seats);

        let studio = t.studios.get_mut(&id).ok_or_else(|| BookingError::not_found("studio", id))?;
        studio.row_count = layout.rows;
        studio.seats_per_row = layout.seats_per_row;
        studio.total_seats = layout.total_seats();
        Ok((studio.clone(), seats))
    }

    async fn delete_studio(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        if !t.studios.contains_key(&id) {
            return Err(BookingError::not_found("studio", id));
        }
        if t.studio_has_showtimes(id) {
            return Err(BookingError::in_use("studio", id, "showtimes"));
        }
        t.seats.retain(|_, s| s.studio_id != id);
        t.studios.remove(&id);
        Ok(())
    }

    async fn list_seats(&self, studio_id: i64) -> StoreResult<Vec<Seat>> {
        let t = self.tables.lock().await;
        if !t.studios.contains_key(&studio_id) {
            return Err(BookingError::not_found("studio", studio_id));
        }
        Ok(t.studio_seats(studio_id))
    }

    async fn insert_movie(&self, movie: MovieInput) -> StoreResult<Movie> {
        let mut t = self.tables.lock().await;
        let now = Utc::now();
        let movie = Movie {
            id: t.next_id("movies"),
            title: movie.title,
            genre: movie.genre,
            duration_minutes: movie.duration_minutes,
            rating: movie.rating,
            status: movie.status,
            release_date: movie.release_date,
            created_at: now,
            updated_at: now,
        };
        t.movies.insert(movie.id, movie.clone());
        Ok(movie)
    }

    async fn get_movie(&self, id: i64) -> StoreResult<Option<Movie>> {
        Ok(self.tables.lock().await.movies.get(&id).cloned())
    }

    async fn list_movies(&self, status: Option<MovieStatus>) -> StoreResult<Vec<Movie>> {
        let t = self.tables.lock().await;
        Ok(t.movies
            .values()
            .filter(|m| status.map_or(true, |s| m.status == s))
            .cloned()
            .collect())
    }

    async fn update_movie(&self, id: i64, input: MovieInput) -> StoreResult<Movie> {
        let mut t = self.tables.lock().await;
        let movie = t.movies.get_mut(&id).ok_or_else(|| BookingError::not_found("movie", id))?;
        movie.title = input.title;
        movie.genre = input.genre;
        movie.duration_minutes = input.duration_minutes;
        movie.rating = input.rating;
        movie.status = input.status;
        movie.release_date = input.release_date;
        movie.updated_at = Utc::now();
        Ok(movie.clone())
    }

    async fn delete_movie(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.lock().await;
        if !t.movies.contains_key(&id) {
            return Err(BookingError::not_found("movie", id));
        }
        if t.showtimes.values().any(|s| s.movie_id == id) {
            return Err(BookingError::in_use("movie", id, "showtimes"));
        }
        t.movies.remove(&id);
        Ok(())
    }

    async fn insert_showtime(&self, showtime: NewShowtime) -> StoreResult<Showtime> {
        let mut t = self.tables.lock().await;
        if !t.movies.contains_key(&showtime.movie_id) {
            return Err(BookingError::not_found("movie", showtime.movie_id));
        }
        if !t.studios.contains_key(&showtime.studio_id) {
            return Err(BookingError::not_found("studio", showtime.studio_id));
        }
        if let Some(existing) = find_conflict(t.showtimes.values(), &showtime, None) {
            return Err(conflict_error(existing));
        }

        let showtime = Showtime {
            id: t.next_id("showtimes"),
            movie_id: showtime.movie_id,
            studio_id: showtime.studio_id,
            show_date: showtime.show_date,
            start_time: showtime.start_time,
            end_time: showtime.end_time,
            price: showtime.price,
            created_at: Utc::now(),
        };
        t.showtimes.insert(showtime.id, showtime.clone());
        Ok(showtime)
    }

    async fn update_showtime(&self, id: i64, update: NewShowtime, now: DateTime<Utc>) -> StoreResult<Showtime> {
        let mut t = self.tables.lock().await;
        let current = t.showtime(id)?.clone();
        if !t.movies.contains_key(&update.movie_id) {
            return Err(BookingError::not_found("movie", update.movie_id));
        }
        if !t.studios.contains_key(&update.studio_id) {
            return Err(BookingError::not_found("studio", update.studio_id));
        }
        if update.studio_id != current.studio_id {
            let live = t
                .booking_seats
                .values()
                .filter(|r| r.showtime_id == id && r.is_active_at(now))
                .count();
            if live > 0 {
                return Err(BookingError::ShowtimeHasBookings {
                    showtime_id: id,
                    active: t.active_bookings(id).len().max(1),
                });
            }
        }
        if let Some(existing) = find_conflict(t.showtimes.values(), &update, Some(id)) {
            return Err(conflict_error(existing));
        }

        let showtime = t.showtimes.get_mut(&id).ok_or_else(|| BookingError::not_found("showtime", id))?;
        showtime.movie_id = update.movie_id;
        showtime.studio_id = update.studio_id;
        showtime.show_date = update.show_date;
        showtime.start_time = update.start_time;
        showtime.end_time = update.end_time;
        showtime.price = update.price;
        Ok(showtime.clone())
    }

    async fn get_showtime(&self, id: i64) -> StoreResult<Option<Showtime>> {
        Ok(self.tables.lock().await.showtimes.get(&id).cloned())
    }

    async fn list_showtimes(&self, filter: &ShowtimeFilter) -> StoreResult<Vec<Showtime>> {
        let t = self.tables.lock().await;
        let mut showtimes: Vec<Showtime> = t.showtimes.values().filter(|s| filter.matches(s)).cloned().collect();
        showtimes.sort_by_key(|s| (s.show_date, s.start_time, s.studio_id));
        Ok(showtimes)
    }

    async fn delete_showtime(&self, id: i64, force: bool, now: DateTime<Utc>) -> StoreResult<DeletedShowtime> {
        let mut t = self.tables.lock().await;
        t.showtime(id)?;

        let active = t.active_bookings(id);
        if !active.is_empty() && !force {
            return Err(BookingError::ShowtimeHasBookings { showtime_id: id, active: active.len() });
        }

        let mut cancelled = Vec::with_capacity(active.len());
        for booking in active {
            cancelled.push(t.transition(booking.id, booking.status, BookingStatus::Cancelled, now)?);
        }

        t.booking_seats.retain(|_, r| r.showtime_id != id);
        t.bookings.retain(|_, b| b.showtime_id != id);
        t.showtimes.remove(&id);
        Ok(DeletedShowtime { cancelled_bookings: cancelled })
    }

    async fn hold_seats(&self, hold: NewHold) -> StoreResult<Vec<BookingSeat>> {
        let seat_ids = normalize_seat_ids(&hold.seat_ids)?;
        let mut t = self.tables.lock().await;
        t.claim_seats(
            hold.reservation_token,
            hold.showtime_id,
            &seat_ids,
            None,
            SeatHoldState::Held,
            Some(hold.expires_at),
            hold.now,
        )
    }

    async fn hold_rows(&self, token: Uuid) -> StoreResult<Vec<BookingSeat>> {
        Ok(self.tables.lock().await.token_rows(token))
    }

    async fn confirm_hold(&self, token: Uuid, now: DateTime<Utc>) -> StoreResult<Vec<BookingSeat>> {
        let mut t = self.tables.lock().await;
        let rows = t.token_rows(token);
        if rows.is_empty() {
            return Err(BookingError::not_found("reservation", token));
        }
        if rows.iter().any(|r| !r.state.is_active() || r.is_expired_at(now)) {
            return Err(BookingError::HoldExpired(token));
        }
        for row in t.booking_seats.values_mut().filter(|r| r.reservation_token == token) {
            row.state = SeatHoldState::Confirmed;
            row.expires_at = None;
        }
        Ok(t.token_rows(token))
    }

    async fn release_hold(&self, token: Uuid) -> StoreResult<Vec<BookingSeat>> {
        let mut t = self.tables.lock().await;
        let mut released = Vec::new();
        for row in t
            .booking_seats
            .values_mut()
            .filter(|r| r.reservation_token == token && r.state.is_active())
        {
            row.state = SeatHoldState::Released;
            released.push(row.clone());
        }
        Ok(released)
    }

    async fn expire_holds(&self, now: DateTime<Utc>) -> StoreResult<Vec<ExpiredHold>> {
        let mut t = self.tables.lock().await;
        let stale: BTreeSet<Uuid> = t
            .booking_seats
            .values()
            .filter(|r| r.is_expired_at(now))
            .map(|r| r.reservation_token)
            .collect();
        Ok(t.expire_tokens(&stale, now))
    }

    async fn showtime_seats(&self, showtime_id: i64, active_only: bool) -> StoreResult<Vec<BookingSeat>> {
        let t = self.tables.lock().await;
        t.showtime(showtime_id)?;
        let mut rows: Vec<BookingSeat> = t
            .booking_seats
            .values()
            .filter(|r| r.showtime_id == showtime_id && (!active_only || r.state.is_active()))
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.seat_id, r.id));
        Ok(rows)
    }

    async fn booking_seats(&self, booking_id: i64) -> StoreResult<Vec<BookingSeat>> {
        let t = self.tables.lock().await;
        if !t.bookings.contains_key(&booking_id) {
            return Err(BookingError::not_found("booking", booking_id));
        }
        Ok(t.booking_seats
            .values()
            .filter(|r| r.booking_id == Some(booking_id))
            .cloned()
            .collect())
    }

    async fn booking_code_exists(&self, code: &str) -> StoreResult<bool> {
        Ok(self.tables.lock().await.bookings.values().any(|b| b.booking_code == code))
    }

    async fn insert_booking(&self, booking: NewBooking, now: DateTime<Utc>) -> StoreResult<Booking> {
        let mut t = self.tables.lock().await;
        if t.bookings.values().any(|b| b.booking_code == booking.booking_code) {
            return Err(BookingError::DuplicateBookingCode(booking.booking_code));
        }
        let token = booking.reservation_token;
        if let Some(bound) = t.bookings.values().find(|b| b.reservation_token == token) {
            return Err(BookingError::in_use("reservation", token, if bound.status.is_active() {
                "an active booking"
            } else {
                "a closed booking"
            }));
        }

        let rows = t.token_rows(token);
        if rows.is_empty() {
            return Err(BookingError::not_found("reservation", token));
        }
        if rows
            .iter()
            .any(|r| r.state != SeatHoldState::Held || r.is_expired_at(now) || r.booking_id.is_some())
        {
            return Err(BookingError::HoldExpired(token));
        }
        if rows.iter().any(|r| r.showtime_id != booking.showtime_id) {
            return Err(BookingError::Validation(format!(
                "reservation {token} does not belong to showtime {}",
                booking.showtime_id
            )));
        }
        if rows.len() != booking.seat_count as usize {
            return Err(BookingError::InvalidSeatCount(booking.seat_count as i64));
        }

        let booking = Booking {
            id: t.next_id("bookings"),
            booking_code: booking.booking_code,
            user_id: booking.user_id,
            showtime_id: booking.showtime_id,
            reservation_token: token,
            seat_count: booking.seat_count,
            default_price_per_seat: booking.default_price_per_seat,
            price_per_seat: booking.price_per_seat,
            total_price: booking.total_price,
            price_override_note: booking.price_override_note,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        for row in t.booking_seats.values_mut().filter(|r| r.reservation_token == token) {
            row.booking_id = Some(booking.id);
        }
        t.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get_booking(&self, id: i64) -> StoreResult<Option<Booking>> {
        Ok(self.tables.lock().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let t = self.tables.lock().await;
        let mut bookings: Vec<Booking> = t.bookings.values().filter(|b| filter.matches(b)).cloned().collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }

    async fn transition_booking(
        &self,
        id: i64,
        from: BookingStatus,
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<Booking> {
        self.tables.lock().await.transition(id, from, to, now)
    }

    async fn add_booking_seats(
        &self,
        booking_id: i64,
        seat_ids: Vec<i64>,
        now: DateTime<Utc>,
    ) -> StoreResult<(Booking, Vec<BookingSeat>)> {
        let seat_ids = normalize_seat_ids(&seat_ids)?;
        let mut t = self.tables.lock().await;
        let booking = t
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| BookingError::not_found("booking", booking_id))?;

        let (state, expires_at) = match booking.status {
            BookingStatus::Pending => {
                let expiry = t
                    .booking_seats
                    .values()
                    .filter(|r| r.booking_id == Some(booking_id) && r.state == SeatHoldState::Held)
                    .filter_map(|r| r.expires_at)
                    .min()
                    .filter(|exp| *exp > now)
                    .ok_or(BookingError::HoldExpired(booking.reservation_token))?;
                (SeatHoldState::Held, Some(expiry))
            }
            BookingStatus::Confirmed => (SeatHoldState::Confirmed, None),
            status => {
                return Err(BookingError::Validation(format!(
                    "booking {booking_id} is {status}; seats can only be added to pending or confirmed bookings"
                )))
            }
        };

        let seat_count = booking.seat_count + seat_ids.len() as i32;
        let total_price = compute_total(seat_count as i64, booking.price_per_seat)?;

        let rows = t.claim_seats(
            booking.reservation_token,
            booking.showtime_id,
            &seat_ids,
            Some(booking_id),
            state,
            expires_at,
            now,
        )?;

        let stored = t
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| BookingError::not_found("booking", booking_id))?;
        stored.seat_count = seat_count;
        stored.total_price = total_price;
        stored.updated_at = now;
        Ok((stored.clone(), rows))
    }

    async fn delete_booking(&self, id: i64) -> StoreResult<Booking> {
        let mut t = self.tables.lock().await;
        let booking = t.bookings.remove(&id).ok_or_else(|| BookingError::not_found("booking", id))?;
        t.booking_seats.retain(|_, r| r.booking_id != Some(id));
        Ok(booking)
    }

    async fn complete_finished(&self, now: NaiveDateTime) -> StoreResult<Vec<Booking>> {
        let mut t = self.tables.lock().await;
        let finished: Vec<i64> = t
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .filter(|b| t.showtimes.get(&b.showtime_id).is_some_and(|s| s.ends_at() <= now))
            .map(|b| b.id)
            .collect();

        let stamp = now.and_utc();
        let mut completed = Vec::with_capacity(finished.len());
        for id in finished {
            completed.push(t.transition(id, BookingStatus::Confirmed, BookingStatus::Completed, stamp)?);
        }
        Ok(completed)
    }
}
