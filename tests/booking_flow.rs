use chrono::{NaiveDate, NaiveTime};
use std::collections::HashSet;
use std::sync::Arc;

use cinema_booking::config::Config;
use cinema_booking::error::BookingError;
use cinema_booking::models::{BookingStatus, MovieInput, MovieStatus, NewStudio, NewUser, UserRole};
use cinema_booking::services::booking_code::is_valid_code;
use cinema_booking::services::layout::{generate_seats, StudioLayout};
use cinema_booking::services::lifecycle::CreateBooking;
use cinema_booking::AppState;

struct Cinema {
    state: Arc<AppState>,
    user_id: i64,
    studio_id: i64,
    movie_id: i64,
    seats: Vec<i64>,
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 6, 1).unwrap()
}

async fn cinema(rows: i32, seats_per_row: i32) -> Cinema {
    let state = AppState::in_memory(Config::in_memory());
    let user = state
        .store
        .insert_user(NewUser {
            name: "Alua".into(),
            email: "alua@example.com".into(),
            password_hash: "not-a-real-hash".into(),
            role: UserRole::User,
        })
        .await
        .unwrap();
    let layout = StudioLayout::new(rows, seats_per_row, None).unwrap();
    let (studio, seats) = state
        .store
        .insert_studio(
            NewStudio {
                name: "Main hall".into(),
                row_count: rows,
                seats_per_row,
                total_seats: layout.total_seats(),
            },
            layout.seats(),
        )
        .await
        .unwrap();
    let movie = state
        .store
        .insert_movie(MovieInput {
            title: "Oppenheimer".into(),
            genre: "drama".into(),
            duration_minutes: 180,
            rating: "R".into(),
            status: MovieStatus::NowPlaying,
            release_date: None,
        })
        .await
        .unwrap();

    Cinema {
        state,
        user_id: user.id,
        studio_id: studio.id,
        movie_id: movie.id,
        seats: seats.iter().map(|s| s.id).collect(),
    }
}

async fn evening_show(c: &Cinema) -> i64 {
    c.state
        .scheduler
        .schedule(c.movie_id, c.studio_id, day(), t(18, 0), t(20, 0), 50_000)
        .await
        .unwrap()
        .id
}

fn booking_for(c: &Cinema, showtime_id: i64, seats: &[i64]) -> CreateBooking {
    CreateBooking {
        user_id: c.user_id,
        showtime_id,
        seat_ids: seats.to_vec(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_studio_layout_generates_row_major_labels() {
    let labels: Vec<String> = generate_seats(2, 3).unwrap().iter().map(|s| s.label()).collect();
    assert_eq!(labels, ["A1", "A2", "A3", "B1", "B2", "B3"]);

    let c = cinema(2, 3).await;
    let stored = c.state.store.list_seats(c.studio_id).await.unwrap();
    let stored: Vec<&str> = stored.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(stored, ["A1", "A2", "A3", "B1", "B2", "B3"]);

    assert!(matches!(
        StudioLayout::new(2, 3, Some(7)),
        Err(BookingError::LayoutMismatch { declared: 7, computed: 6, .. })
    ));
}

#[tokio::test]
async fn test_overlapping_showtimes_rejected() {
    let c = cinema(2, 3).await;
    let first = evening_show(&c).await;

    let err = c
        .state
        .scheduler
        .schedule(c.movie_id, c.studio_id, day(), t(19, 0), t(21, 0), 50_000)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ScheduleConflict { conflicting_id, .. } if conflicting_id == first));

    c.state
        .scheduler
        .schedule(c.movie_id, c.studio_id, day(), t(20, 0), t(22, 0), 50_000)
        .await
        .unwrap();

    let err = c
        .state
        .scheduler
        .schedule(c.movie_id, c.studio_id, day(), t(22, 0), t(21, 0), 50_000)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidTimeRange { .. }));
}

#[tokio::test]
async fn test_reschedule_excludes_itself() {
    let c = cinema(1, 2).await;
    let show = evening_show(&c).await;
    let mut update = c.state.scheduler.get(show).await.unwrap();
    update.start_time = t(18, 30);
    update.end_time = t(20, 30);

    let moved = c
        .state
        .scheduler
        .reschedule(
            show,
            cinema_booking::models::NewShowtime {
                movie_id: update.movie_id,
                studio_id: update.studio_id,
                show_date: update.show_date,
                start_time: update.start_time,
                end_time: update.end_time,
                price: update.price,
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.start_time, t(18, 30));
}

#[tokio::test]
async fn test_three_seats_at_showtime_price() {
    let c = cinema(2, 3).await;
    let show = evening_show(&c).await;
    let receipt = c
        .state
        .bookings
        .create_booking(booking_for(&c, show, &c.seats[..3]))
        .await
        .unwrap();
    assert_eq!(receipt.booking.seat_count, 3);
    assert_eq!(receipt.booking.price_per_seat, 50_000);
    assert_eq!(receipt.booking.total_price, 150_000);
    assert!(is_valid_code(&receipt.booking.booking_code));
}

#[tokio::test]
async fn test_cancelled_confirmed_booking_frees_seats() {
    let c = cinema(2, 3).await;
    let show = evening_show(&c).await;
    let booking = c
        .state
        .bookings
        .create_booking(booking_for(&c, show, &c.seats[..2]))
        .await
        .unwrap()
        .booking;
    c.state.bookings.confirm_booking(booking.id).await.unwrap();

    let err = c.state.ledger.reserve(show, &c.seats[..1], None).await.unwrap_err();
    assert!(matches!(err, BookingError::SeatConflict { .. }));

    let cancelled = c.state.bookings.cancel_booking(booking.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    c.state.ledger.reserve(show, &c.seats[..2], None).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_seat_goes_to_exactly_one_caller() {
    let c = cinema(1, 1).await;
    let show = evening_show(&c).await;
    let seat = c.seats[0];

    let mut handles = Vec::new();
    for _ in 0..16 {
        let state = c.state.clone();
        let req = booking_for(&c, show, &[seat]);
        handles.push(tokio::spawn(async move { state.bookings.create_booking(req).await }));
    }

    let mut won = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(BookingError::SeatConflict { seat_ids, .. }) => {
                assert_eq!(seat_ids, vec![seat]);
                conflicts += 1;
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(conflicts, 15);

    let active = c.state.ledger.occupancy(show).await.unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scheduling_accepts_one_slot() {
    let c = cinema(1, 1).await;
    let mut handles = Vec::new();
    for i in 0..8u32 {
        let state = c.state.clone();
        let (movie, studio) = (c.movie_id, c.studio_id);
        handles.push(tokio::spawn(async move {
            state
                .scheduler
                .schedule(movie, studio, day(), t(18, i), t(20, i), 40_000)
                .await
        }));
    }
    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn test_booking_codes_are_unique() {
    let c = cinema(4, 10).await;
    let show = evening_show(&c).await;

    let mut codes = HashSet::new();
    for seat in &c.seats {
        let receipt = c
            .state
            .bookings
            .create_booking(booking_for(&c, show, &[*seat]))
            .await
            .unwrap();
        assert!(codes.insert(receipt.booking.booking_code));
    }
    assert_eq!(codes.len(), 40);
}

#[tokio::test]
async fn test_at_most_one_active_row_per_seat() {
    let c = cinema(2, 4).await;
    let show = evening_show(&c).await;

    let a = c
        .state
        .bookings
        .create_booking(booking_for(&c, show, &c.seats[..3]))
        .await
        .unwrap()
        .booking;
    c.state.bookings.cancel_booking(a.id).await.unwrap();
    let b = c
        .state
        .bookings
        .create_booking(booking_for(&c, show, &c.seats[1..5]))
        .await
        .unwrap()
        .booking;
    c.state.bookings.confirm_booking(b.id).await.unwrap();
    c.state.ledger.reserve(show, &c.seats[..1], None).await.unwrap();

    let active = c.state.ledger.occupancy(show).await.unwrap();
    let mut seen = HashSet::new();
    for row in &active {
        assert!(seen.insert(row.seat_id), "seat {} has two active rows", row.seat_id);
    }
    assert_eq!(active.len(), 5);

    // total always equals seat_count * price_per_seat
    for booking in c.state.bookings.list(&Default::default()).await.unwrap() {
        assert_eq!(booking.total_price, booking.seat_count as i64 * booking.price_per_seat);
    }
}

#[tokio::test]
async fn test_delete_showtime_requires_force_with_bookings() {
    let c = cinema(1, 3).await;
    let show = evening_show(&c).await;
    let booking = c
        .state
        .bookings
        .create_booking(booking_for(&c, show, &c.seats[..2]))
        .await
        .unwrap()
        .booking;

    let err = c.state.scheduler.cancel_showtime(show, false).await.unwrap_err();
    assert!(matches!(err, BookingError::ShowtimeHasBookings { active: 1, .. }));

    let deleted = c.state.scheduler.cancel_showtime(show, true).await.unwrap();
    assert_eq!(deleted.cancelled_bookings.len(), 1);
    assert_eq!(deleted.cancelled_bookings[0].id, booking.id);
    assert_eq!(deleted.cancelled_bookings[0].status, BookingStatus::Cancelled);
    assert!(matches!(
        c.state.scheduler.get(show).await,
        Err(BookingError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_studio_in_use_cannot_be_relaid_or_deleted() {
    let c = cinema(1, 3).await;
    evening_show(&c).await;

    let layout = StudioLayout::new(3, 3, None).unwrap();
    let err = c
        .state
        .store
        .replace_layout(c.studio_id, layout, layout.seats())
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ResourceInUse { resource: "studio", .. }));
    assert!(matches!(
        c.state.store.delete_studio(c.studio_id).await,
        Err(BookingError::ResourceInUse { .. })
    ));
    assert!(matches!(
        c.state.store.delete_movie(c.movie_id).await,
        Err(BookingError::ResourceInUse { resource: "movie", .. })
    ));
}
