//! Postgres backend. Each atomic operation is one transaction; seat
//! exclusivity is enforced by the partial unique index on active
//! `booking_seats` rows, showtime overlap by a per-studio advisory lock.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{normalize_seat_ids, DeletedShowtime, Store, StoreResult};
use crate::database::Database;
use crate::error::BookingError;
use crate::models::*;
use crate::services::layout::StudioLayout;
use crate::services::pricing::compute_total;
use crate::services::scheduler::{conflict_error, find_conflict};

const BOOKING_COLUMNS: &str = "id, booking_code, user_id, showtime_id, reservation_token, seat_count, \
     default_price_per_seat, price_per_seat, total_price, price_override_note, status, created_at, updated_at";

const HOLD_COLUMNS: &str = "id, reservation_token, booking_id, showtime_id, seat_id, state, expires_at, created_at";

#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db.pool
    }
}

/// Check + insert of seat rows inside the caller's transaction. A seat
/// claimed concurrently after the check is skipped by `ON CONFLICT` and
/// reported as a conflict; the caller's rollback discards the partial insert.
#[allow(clippy::too_many_arguments)]
async fn claim_seats(
    conn: &mut PgConnection,
    token: Uuid,
    showtime_id: i64,
    seat_ids: &[i64],
    booking_id: Option<i64>,
    state: SeatHoldState,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> StoreResult<Vec<BookingSeat>> {
    let studio_id = sqlx::query_scalar::<_, i64>("SELECT studio_id FROM showtimes WHERE id = $1")
        .bind(showtime_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| BookingError::not_found("showtime", showtime_id))?;

    let known = sqlx::query_scalar::<_, i64>("SELECT id FROM seats WHERE studio_id = $1 AND id = ANY($2)")
        .bind(studio_id)
        .bind(seat_ids)
        .fetch_all(&mut *conn)
        .await?;
    if let Some(missing) = seat_ids.iter().find(|id| !known.contains(id)) {
        return Err(BookingError::not_found("seat", format!("{missing} in studio {studio_id}")));
    }

    // Просроченные, но ещё не очищенные холды не блокируют места
    let stale = sqlx::query_scalar::<_, Uuid>(
        "SELECT DISTINCT reservation_token FROM booking_seats
         WHERE showtime_id = $1 AND seat_id = ANY($2) AND state = 'held' AND expires_at <= $3",
    )
    .bind(showtime_id)
    .bind(seat_ids)
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;
    if !stale.is_empty() {
        expire_tokens(&mut *conn, &stale, now).await?;
    }

    let taken = sqlx::query_scalar::<_, i64>(
        "SELECT DISTINCT seat_id FROM booking_seats
         WHERE showtime_id = $1 AND seat_id = ANY($2) AND state IN ('held', 'confirmed')
         ORDER BY seat_id",
    )
    .bind(showtime_id)
    .bind(seat_ids)
    .fetch_all(&mut *conn)
    .await?;
    if !taken.is_empty() {
        return Err(BookingError::SeatConflict { showtime_id, seat_ids: taken });
    }

    // Без цели конфликта покрывает и частичный индекс uq_booking_seats_active
    let mut rows = sqlx::query_as::<_, BookingSeat>(&format!(
        "INSERT INTO booking_seats (reservation_token, booking_id, showtime_id, seat_id, state, expires_at, created_at)
         SELECT $1, $2, $3, seat_id, $4, $5, $6 FROM UNNEST($7::bigint[]) AS seat_id
         ON CONFLICT DO NOTHING
         RETURNING {HOLD_COLUMNS}"
    ))
    .bind(token)
    .bind(booking_id)
    .bind(showtime_id)
    .bind(state)
    .bind(expires_at)
    .bind(now)
    .bind(seat_ids)
    .fetch_all(&mut *conn)
    .await?;

    if rows.len() < seat_ids.len() {
        let lost: Vec<i64> = seat_ids
            .iter()
            .copied()
            .filter(|id| !rows.iter().any(|r| r.seat_id == *id))
            .collect();
        debug!("Seat claim race on showtime {}: {:?}", showtime_id, lost);
        return Err(BookingError::SeatConflict { showtime_id, seat_ids: lost });
    }

    rows.sort_by_key(|r| r.seat_id);
    Ok(rows)
}

/// Name of the violated unique constraint, if `err` is one.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}

async fn insert_seats(conn: &mut PgConnection, studio_id: i64, specs: &[SeatSpec]) -> StoreResult<Vec<Seat>> {
    let rows: Vec<String> = specs.iter().map(|s| s.row_label.clone()).collect();
    let numbers: Vec<i32> = specs.iter().map(|s| s.number).collect();
    let labels: Vec<String> = specs.iter().map(SeatSpec::label).collect();

    let mut seats = sqlx::query_as::<_, Seat>(
        "INSERT INTO seats (studio_id, row_label, number, label)
         SELECT $1, r, n, l FROM UNNEST($2::text[], $3::int4[], $4::text[]) AS t(r, n, l)
         RETURNING id, studio_id, row_label, number, label",
    )
    .bind(studio_id)
    .bind(&rows)
    .bind(&numbers)
    .bind(&labels)
    .fetch_all(&mut *conn)
    .await?;
    seats.sort_by_key(|s| s.id);
    Ok(seats)
}

async fn studio_has_showtimes(conn: &mut PgConnection, studio_id: i64) -> StoreResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM showtimes WHERE studio_id = $1)")
        .bind(studio_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// Releases the held rows of every token and cancels the pending bookings
/// bound to them. Rows already freed by a concurrent sweep are skipped.
async fn expire_tokens(conn: &mut PgConnection, tokens: &[Uuid], now: DateTime<Utc>) -> StoreResult<Vec<ExpiredHold>> {
    let released = sqlx::query_as::<_, (Uuid, i64, Option<i64>, i64)>(
        "UPDATE booking_seats SET state = 'released'
         WHERE reservation_token = ANY($1) AND state = 'held'
         RETURNING reservation_token, showtime_id, booking_id, seat_id",
    )
    .bind(tokens)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_token: BTreeMap<Uuid, ExpiredHold> = BTreeMap::new();
    for (token, showtime_id, booking_id, seat_id) in released {
        let hold = by_token.entry(token).or_insert_with(|| ExpiredHold {
            reservation_token: token,
            showtime_id,
            booking_id: None,
            seat_ids: Vec::new(),
        });
        hold.booking_id = hold.booking_id.or(booking_id);
        hold.seat_ids.push(seat_id);
    }

    let booking_ids: Vec<i64> = by_token.values().filter_map(|h| h.booking_id).collect();
    if !booking_ids.is_empty() {
        sqlx::query(
            "UPDATE bookings SET status = 'cancelled', updated_at = $2
             WHERE id = ANY($1) AND status = 'pending'",
        )
        .bind(&booking_ids)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    Ok(by_token
        .into_values()
        .map(|mut hold| {
            hold.seat_ids.sort_unstable();
            hold
        })
        .collect())
}

/// Status change plus the matching seat-row change. `booking` must have
/// been locked by the caller.
async fn apply_transition(
    conn: &mut PgConnection,
    booking: &Booking,
    to: BookingStatus,
    now: DateTime<Utc>,
) -> StoreResult<Booking> {
    if !booking.status.can_transition_to(to) {
        return Err(BookingError::InvalidTransition { from: booking.status, to });
    }

    match to {
        BookingStatus::Confirmed => {
            let rows = sqlx::query_as::<_, BookingSeat>(&format!(
                "SELECT {HOLD_COLUMNS} FROM booking_seats WHERE booking_id = $1 FOR UPDATE"
            ))
            .bind(booking.id)
            .fetch_all(&mut *conn)
            .await?;
            if rows.iter().any(|r| r.is_expired_at(now) || !r.state.is_active()) {
                return Err(BookingError::HoldExpired(booking.reservation_token));
            }
            sqlx::query(
                "UPDATE booking_seats SET state = 'confirmed', expires_at = NULL
                 WHERE booking_id = $1 AND state IN ('held', 'confirmed')",
            )
            .bind(booking.id)
            .execute(&mut *conn)
            .await?;
        }
        BookingStatus::Cancelled => {
            sqlx::query(
                "UPDATE booking_seats SET state = 'released'
                 WHERE booking_id = $1 AND state IN ('held', 'confirmed')",
            )
            .bind(booking.id)
            .execute(&mut *conn)
            .await?;
        }
        BookingStatus::Completed => {
            sqlx::query("UPDATE booking_seats SET state = 'completed' WHERE booking_id = $1 AND state = 'confirmed'")
                .bind(booking.id)
                .execute(&mut *conn)
                .await?;
        }
        BookingStatus::Pending => {}
    }

    let updated = sqlx::query_as::<_, Booking>(&format!(
        "UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
    ))
    .bind(booking.id)
    .bind(to)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(updated)
}

async fn lock_booking(conn: &mut PgConnection, id: i64) -> StoreResult<Booking> {
    sqlx::query_as::<_, Booking>(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| BookingError::not_found("booking", id))
}

async fn lock_studios(conn: &mut PgConnection, studio_ids: &[i64]) -> StoreResult<()> {
    let mut ids = studio_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    for id in ids {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn ensure_exists(conn: &mut PgConnection, table: &'static str, resource: &'static str, id: i64) -> StoreResult<()> {
    let exists = sqlx::query_scalar::<_, bool>(&format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)"))
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(BookingError::not_found(resource, id))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let inserted = sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email, password_hash, role) VALUES ($1, $2, $3, $4)
             RETURNING id, name, email, password_hash, role, created_at",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(self.pool())
        .await;

        match inserted {
            Ok(user) => Ok(user),
            Err(e) if unique_violation(&e).is_some() => {
                Err(BookingError::Validation(format!("email {} is already registered", user.email)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, role, created_at FROM users ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(users)
    }

    async fn insert_studio(&self, studio: NewStudio, seats: Vec<SeatSpec>) -> StoreResult<(Studio, Vec<Seat>)> {
        let mut tx = self.pool().begin().await?;
        let studio = sqlx::query_as::<_, Studio>(
            "INSERT INTO studios (name, row_count, seats_per_row, total_seats) VALUES ($1, $2, $3, $4)
             RETURNING id, name, row_count, seats_per_row, total_seats, created_at",
        )
        .bind(&studio.name)
        .bind(studio.row_count)
        .bind(studio.seats_per_row)
        .bind(studio.total_seats)
        .fetch_one(&mut *tx)
        .await?;

        let seats = insert_seats(&mut tx, studio.id, &seats).await?;
        tx.commit().await?;
        Ok((studio, seats))
    }

    async fn get_studio(&self, id: i64) -> StoreResult<Option<Studio>> {
        let studio = sqlx::query_as::<_, Studio>(
            "SELECT id, name, row_count, seats_per_row, total_seats, created_at FROM studios WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(studio)
    }

    async fn list_studios(&self) -> StoreResult<Vec<Studio>> {
        let studios = sqlx::query_as::<_, Studio>(
            "SELECT id, name, row_count, seats_per_row, total_seats, created_at FROM studios ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(studios)
    }

    async fn rename_studio(&self, id: i64, name: String) -> StoreResult<Studio> {
        sqlx::query_as::<_, Studio>(
            "UPDATE studios SET name = $2 WHERE id = $1
             RETURNING id, name, row_count, seats_per_row, total_seats, created_at",
        )
        .bind(id)
        .bind(&name)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| BookingError::not_found("studio", id))
    }

    async fn replace_layout(
        &self,
        id: i64,
        layout: StudioLayout,
        seats: Vec<SeatSpec>,
    ) -> StoreResult<(Studio, Vec<Seat>)> {
        let mut tx = self.pool().begin().await?;
        lock_studios(&mut tx, &[id]).await?;
        ensure_exists(&mut tx, "studios", "studio", id).await?;
        if studio_has_showtimes(&mut tx, id).await? {
            return Err(BookingError::in_use("studio", id, "showtimes"));
        }

        sqlx::query("DELETE FROM seats WHERE studio_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let seats = insert_seats(&mut tx, id, &seats).await?;
        let studio = sqlx::query_as::<_, Studio>(
            "UPDATE studios SET row_count = $2, seats_per_row = $3, total_seats = $4 WHERE id = $1
             RETURNING id, name, row_count, seats_per_row, total_seats, created_at",
        )
        .bind(id)
        .bind(layout.rows)
        .bind(layout.seats_per_row)
        .bind(layout.total_seats())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((studio, seats))
    }

    async fn delete_studio(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.pool().begin().await?;
        lock_studios(&mut tx, &[id]).await?;
        ensure_exists(&mut tx, "studios", "studio", id).await?;
        if studio_has_showtimes(&mut tx, id).await? {
            return Err(BookingError::in_use("studio", id, "showtimes"));
        }
        sqlx::query("DELETE FROM studios WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_seats(&self, studio_id: i64) -> StoreResult<Vec<Seat>> {
        let mut conn = self.pool().acquire().await?;
        ensure_exists(&mut conn, "studios", "studio", studio_id).await?;
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT id, studio_id, row_label, number, label FROM seats WHERE studio_id = $1 ORDER BY id",
        )
        .bind(studio_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(seats)
    }

    async fn insert_movie(&self, movie: MovieInput) -> StoreResult<Movie> {
        let movie = sqlx::query_as::<_, Movie>(
            "INSERT INTO movies (title, genre, duration_minutes, rating, status, release_date)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, title, genre, duration_minutes, rating, status, release_date, created_at, updated_at",
        )
        .bind(&movie.title)
        .bind(&movie.genre)
        .bind(movie.duration_minutes)
        .bind(&movie.rating)
        .bind(movie.status)
        .bind(movie.release_date)
        .fetch_one(self.pool())
        .await?;
        Ok(movie)
    }

    async fn get_movie(&self, id: i64) -> StoreResult<Option<Movie>> {
        let movie = sqlx::query_as::<_, Movie>(
            "SELECT id, title, genre, duration_minutes, rating, status, release_date, created_at, updated_at
             FROM movies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(movie)
    }

    async fn list_movies(&self, status: Option<MovieStatus>) -> StoreResult<Vec<Movie>> {
        let movies = sqlx::query_as::<_, Movie>(
            "SELECT id, title, genre, duration_minutes, rating, status, release_date, created_at, updated_at
             FROM movies WHERE ($1::movie_status IS NULL OR status = $1) ORDER BY id",
        )
        .bind(status)
        .fetch_all(self.pool())
        .await?;
        Ok(movies)
    }

    async fn update_movie(&self, id: i64, movie: MovieInput) -> StoreResult<Movie> {
        sqlx::query_as::<_, Movie>(
            "UPDATE movies SET title = $2, genre = $3, duration_minutes = $4, rating = $5, status = $6,
                 release_date = $7, updated_at = NOW()
             WHERE id = $1
             RETURNING id, title, genre, duration_minutes, rating, status, release_date, created_at, updated_at",
        )
        .bind(id)
        .bind(&movie.title)
        .bind(&movie.genre)
        .bind(movie.duration_minutes)
        .bind(&movie.rating)
        .bind(movie.status)
        .bind(movie.release_date)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| BookingError::not_found("movie", id))
    }

    async fn delete_movie(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.pool().begin().await?;
        ensure_exists(&mut tx, "movies", "movie", id).await?;
        let referenced = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM showtimes WHERE movie_id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if referenced {
            return Err(BookingError::in_use("movie", id, "showtimes"));
        }
        sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_showtime(&self, showtime: NewShowtime) -> StoreResult<Showtime> {
        let mut tx = self.pool().begin().await?;
        lock_studios(&mut tx, &[showtime.studio_id]).await?;
        ensure_exists(&mut tx, "movies", "movie", showtime.movie_id).await?;
        ensure_exists(&mut tx, "studios", "studio", showtime.studio_id).await?;

        let same_day = sqlx::query_as::<_, Showtime>(
            "SELECT id, movie_id, studio_id, show_date, start_time, end_time, price, created_at
             FROM showtimes WHERE studio_id = $1 AND show_date = $2",
        )
        .bind(showtime.studio_id)
        .bind(showtime.show_date)
        .fetch_all(&mut *tx)
        .await?;
        if let Some(existing) = find_conflict(&same_day, &showtime, None) {
            return Err(conflict_error(existing));
        }

        let inserted = sqlx::query_as::<_, Showtime>(
            "INSERT INTO showtimes (movie_id, studio_id, show_date, start_time, end_time, price)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, movie_id, studio_id, show_date, start_time, end_time, price, created_at",
        )
        .bind(showtime.movie_id)
        .bind(showtime.studio_id)
        .bind(showtime.show_date)
        .bind(showtime.start_time)
        .bind(showtime.end_time)
        .bind(showtime.price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted)
    }

    async fn update_showtime(&self, id: i64, update: NewShowtime, now: DateTime<Utc>) -> StoreResult<Showtime> {
        let mut tx = self.pool().begin().await?;
        let current_studio = sqlx::query_scalar::<_, i64>("SELECT studio_id FROM showtimes WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| BookingError::not_found("showtime", id))?;
        lock_studios(&mut tx, &[current_studio, update.studio_id]).await?;
        ensure_exists(&mut tx, "movies", "movie", update.movie_id).await?;
        ensure_exists(&mut tx, "studios", "studio", update.studio_id).await?;

        if update.studio_id != current_studio {
            let live = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM booking_seats
                 WHERE showtime_id = $1
                   AND (state = 'confirmed' OR (state = 'held' AND (expires_at IS NULL OR expires_at > $2)))",
            )
            .bind(id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            if live > 0 {
                let active = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM bookings WHERE showtime_id = $1 AND status IN ('pending', 'confirmed')",
                )
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
                return Err(BookingError::ShowtimeHasBookings {
                    showtime_id: id,
                    active: (active as usize).max(1),
                });
            }
        }

        let same_day = sqlx::query_as::<_, Showtime>(
            "SELECT id, movie_id, studio_id, show_date, start_time, end_time, price, created_at
             FROM showtimes WHERE studio_id = $1 AND show_date = $2",
        )
        .bind(update.studio_id)
        .bind(update.show_date)
        .fetch_all(&mut *tx)
        .await?;
        if let Some(existing) = find_conflict(&same_day, &update, Some(id)) {
            return Err(conflict_error(existing));
        }

        let showtime = sqlx::query_as::<_, Showtime>(
            "UPDATE showtimes SET movie_id = $2, studio_id = $3, show_date = $4, start_time = $5,
                 end_time = $6, price = $7
             WHERE id = $1
             RETURNING id, movie_id, studio_id, show_date, start_time, end_time, price, created_at",
        )
        .bind(id)
        .bind(update.movie_id)
        .bind(update.studio_id)
        .bind(update.show_date)
        .bind(update.start_time)
        .bind(update.end_time)
        .bind(update.price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(showtime)
    }

    async fn get_showtime(&self, id: i64) -> StoreResult<Option<Showtime>> {
        let showtime = sqlx::query_as::<_, Showtime>(
            "SELECT id, movie_id, studio_id, show_date, start_time, end_time, price, created_at
             FROM showtimes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(showtime)
    }

    async fn list_showtimes(&self, filter: &ShowtimeFilter) -> StoreResult<Vec<Showtime>> {
        let showtimes = sqlx::query_as::<_, Showtime>(
            "SELECT id, movie_id, studio_id, show_date, start_time, end_time, price, created_at
             FROM showtimes
             WHERE ($1::bigint IS NULL OR movie_id = $1)
               AND ($2::bigint IS NULL OR studio_id = $2)
               AND ($3::date IS NULL OR show_date = $3)
             ORDER BY show_date, start_time, studio_id",
        )
        .bind(filter.movie_id)
        .bind(filter.studio_id)
        .bind(filter.date)
        .fetch_all(self.pool())
        .await?;
        Ok(showtimes)
    }

    async fn delete_showtime(&self, id: i64, force: bool, now: DateTime<Utc>) -> StoreResult<DeletedShowtime> {
        let mut tx = self.pool().begin().await?;
        sqlx::query_scalar::<_, i64>("SELECT id FROM showtimes WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| BookingError::not_found("showtime", id))?;

        let active = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE showtime_id = $1 AND status IN ('pending', 'confirmed')
             ORDER BY id FOR UPDATE"
        ))
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        if !active.is_empty() && !force {
            return Err(BookingError::ShowtimeHasBookings { showtime_id: id, active: active.len() });
        }

        let mut cancelled = Vec::with_capacity(active.len());
        for booking in &active {
            cancelled.push(apply_transition(&mut tx, booking, BookingStatus::Cancelled, now).await?);
        }

        // bookings и booking_seats удаляются каскадом
        sqlx::query("DELETE FROM showtimes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(DeletedShowtime { cancelled_bookings: cancelled })
    }

    async fn hold_seats(&self, hold: NewHold) -> StoreResult<Vec<BookingSeat>> {
        let seat_ids = normalize_seat_ids(&hold.seat_ids)?;
        let mut tx = self.pool().begin().await?;
        let rows = claim_seats(
            &mut tx,
            hold.reservation_token,
            hold.showtime_id,
            &seat_ids,
            None,
            SeatHoldState::Held,
            Some(hold.expires_at),
            hold.now,
        )
        .await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn hold_rows(&self, token: Uuid) -> StoreResult<Vec<BookingSeat>> {
        let rows = sqlx::query_as::<_, BookingSeat>(&format!(
            "SELECT {HOLD_COLUMNS} FROM booking_seats WHERE reservation_token = $1 ORDER BY seat_id"
        ))
        .bind(token)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn confirm_hold(&self, token: Uuid, now: DateTime<Utc>) -> StoreResult<Vec<BookingSeat>> {
        let mut tx = self.pool().begin().await?;
        let rows = sqlx::query_as::<_, BookingSeat>(&format!(
            "SELECT {HOLD_COLUMNS} FROM booking_seats WHERE reservation_token = $1 FOR UPDATE"
        ))
        .bind(token)
        .fetch_all(&mut *tx)
        .await?;
        if rows.is_empty() {
            return Err(BookingError::not_found("reservation", token));
        }
        if rows.iter().any(|r| !r.state.is_active() || r.is_expired_at(now)) {
            return Err(BookingError::HoldExpired(token));
        }

        let mut confirmed = sqlx::query_as::<_, BookingSeat>(&format!(
            "UPDATE booking_seats SET state = 'confirmed', expires_at = NULL
             WHERE reservation_token = $1 AND state IN ('held', 'confirmed')
             RETURNING {HOLD_COLUMNS}"
        ))
        .bind(token)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        confirmed.sort_by_key(|r| r.seat_id);
        Ok(confirmed)
    }

    async fn release_hold(&self, token: Uuid) -> StoreResult<Vec<BookingSeat>> {
        let released = sqlx::query_as::<_, BookingSeat>(&format!(
            "UPDATE booking_seats SET state = 'released'
             WHERE reservation_token = $1 AND state IN ('held', 'confirmed')
             RETURNING {HOLD_COLUMNS}"
        ))
        .bind(token)
        .fetch_all(self.pool())
        .await?;
        Ok(released)
    }

    async fn expire_holds(&self, now: DateTime<Utc>) -> StoreResult<Vec<ExpiredHold>> {
        let mut tx = self.pool().begin().await?;
        let stale = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT reservation_token FROM booking_seats WHERE state = 'held' AND expires_at <= $1",
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;
        if stale.is_empty() {
            return Ok(Vec::new());
        }
        let expired = expire_tokens(&mut tx, &stale, now).await?;
        tx.commit().await?;
        Ok(expired)
    }

    async fn showtime_seats(&self, showtime_id: i64, active_only: bool) -> StoreResult<Vec<BookingSeat>> {
        let mut conn = self.pool().acquire().await?;
        ensure_exists(&mut conn, "showtimes", "showtime", showtime_id).await?;
        let rows = sqlx::query_as::<_, BookingSeat>(&format!(
            "SELECT {HOLD_COLUMNS} FROM booking_seats
             WHERE showtime_id = $1 AND (NOT $2 OR state IN ('held', 'confirmed'))
             ORDER BY seat_id, id"
        ))
        .bind(showtime_id)
        .bind(active_only)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    async fn booking_seats(&self, booking_id: i64) -> StoreResult<Vec<BookingSeat>> {
        let mut conn = self.pool().acquire().await?;
        ensure_exists(&mut conn, "bookings", "booking", booking_id).await?;
        let rows = sqlx::query_as::<_, BookingSeat>(&format!(
            "SELECT {HOLD_COLUMNS} FROM booking_seats WHERE booking_id = $1 ORDER BY id"
        ))
        .bind(booking_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    async fn booking_code_exists(&self, code: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM bookings WHERE booking_code = $1)")
            .bind(code)
            .fetch_one(self.pool())
            .await?;
        Ok(exists)
    }

    async fn insert_booking(&self, booking: NewBooking, now: DateTime<Utc>) -> StoreResult<Booking> {
        let token = booking.reservation_token;
        let mut tx = self.pool().begin().await?;

        let rows = sqlx::query_as::<_, BookingSeat>(&format!(
            "SELECT {HOLD_COLUMNS} FROM booking_seats WHERE reservation_token = $1 FOR UPDATE"
        ))
        .bind(token)
        .fetch_all(&mut *tx)
        .await?;

        let bound = sqlx::query_scalar::<_, BookingStatus>("SELECT status FROM bookings WHERE reservation_token = $1")
            .bind(token)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(status) = bound {
            let by = if status.is_active() { "an active booking" } else { "a closed booking" };
            return Err(BookingError::in_use("reservation", token, by));
        }

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

        let inserted = sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings (booking_code, user_id, showtime_id, reservation_token, seat_count,
                 default_price_per_seat, price_per_seat, total_price, price_override_note, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $10)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(&booking.booking_code)
        .bind(booking.user_id)
        .bind(booking.showtime_id)
        .bind(token)
        .bind(booking.seat_count)
        .bind(booking.default_price_per_seat)
        .bind(booking.price_per_seat)
        .bind(booking.total_price)
        .bind(&booking.price_override_note)
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        let inserted = match inserted {
            Ok(b) => b,
            Err(e) => {
                return Err(match unique_violation(&e) {
                    Some(constraint) if constraint.contains("booking_code") => {
                        BookingError::DuplicateBookingCode(booking.booking_code)
                    }
                    Some(_) => BookingError::in_use("reservation", token, "an active booking"),
                    None => e.into(),
                })
            }
        };

        sqlx::query("UPDATE booking_seats SET booking_id = $1 WHERE reservation_token = $2")
            .bind(inserted.id)
            .bind(token)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_booking(&self, id: i64) -> StoreResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(booking)
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE ($1::bigint IS NULL OR user_id = $1)
               AND ($2::bigint IS NULL OR showtime_id = $2)
               AND ($3::booking_status IS NULL OR status = $3)
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(filter.user_id)
        .bind(filter.showtime_id)
        .bind(filter.status)
        .fetch_all(self.pool())
        .await?;
        Ok(bookings)
    }

    async fn transition_booking(
        &self,
        id: i64,
        from: BookingStatus,
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<Booking> {
        let mut tx = self.pool().begin().await?;
        let booking = lock_booking(&mut tx, id).await?;
        if booking.status != from {
            return Err(BookingError::InvalidTransition { from: booking.status, to });
        }
        let updated = apply_transition(&mut tx, &booking, to, now).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn add_booking_seats(
        &self,
        booking_id: i64,
        seat_ids: Vec<i64>,
        now: DateTime<Utc>,
    ) -> StoreResult<(Booking, Vec<BookingSeat>)> {
        let seat_ids = normalize_seat_ids(&seat_ids)?;
        let mut tx = self.pool().begin().await?;
        let booking = lock_booking(&mut tx, booking_id).await?;

        let (state, expires_at) = match booking.status {
            BookingStatus::Pending => {
                let expiry = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
                    "SELECT MIN(expires_at) FROM booking_seats WHERE booking_id = $1 AND state = 'held'",
                )
                .bind(booking_id)
                .fetch_one(&mut *tx)
                .await?
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

        let rows = claim_seats(
            &mut tx,
            booking.reservation_token,
            booking.showtime_id,
            &seat_ids,
            Some(booking_id),
            state,
            expires_at,
            now,
        )
        .await?;

        let updated = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET seat_count = $2, total_price = $3, updated_at = $4 WHERE id = $1
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .bind(seat_count)
        .bind(total_price)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((updated, rows))
    }

    async fn delete_booking(&self, id: i64) -> StoreResult<Booking> {
        // booking_seats удаляются каскадом
        sqlx::query_as::<_, Booking>(&format!("DELETE FROM bookings WHERE id = $1 RETURNING {BOOKING_COLUMNS}"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| BookingError::not_found("booking", id))
    }

    async fn complete_finished(&self, now: NaiveDateTime) -> StoreResult<Vec<Booking>> {
        let mut tx = self.pool().begin().await?;
        let finished = sqlx::query_as::<_, Booking>(
            "SELECT b.id, b.booking_code, b.user_id, b.showtime_id, b.reservation_token, b.seat_count,
                 b.default_price_per_seat, b.price_per_seat, b.total_price, b.price_override_note,
                 b.status, b.created_at, b.updated_at
             FROM bookings b
             JOIN showtimes s ON s.id = b.showtime_id
             WHERE b.status = 'confirmed' AND s.show_date + s.end_time <= $1
             ORDER BY b.id
             FOR UPDATE OF b SKIP LOCKED",
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        let stamp = now.and_utc();
        let mut completed = Vec::with_capacity(finished.len());
        for booking in &finished {
            match apply_transition(&mut tx, booking, BookingStatus::Completed, stamp).await {
                Ok(b) => completed.push(b),
                Err(e) => {
                    warn!("Could not complete booking {}: {}", booking.booking_code, e);
                    return Err(e);
                }
            }
        }
        tx.commit().await?;
        Ok(completed)
    }
}
