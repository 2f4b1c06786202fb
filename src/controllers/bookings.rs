use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::models::{Booking, BookingFilter, BookingSeat, BookingStatus};
use crate::services::lifecycle::CreateBooking;
use crate::services::pricing::PriceOverride;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/{id}", get(get_booking).delete(delete_booking))
        .route("/bookings/{id}/status", patch(update_status))
        .route("/bookings/{id}/seats", get(booking_seats).post(add_seats))
}

/* ---------- requests ---------- */

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub user_id: i64,
    pub showtime_id: i64,
    #[serde(default)]
    pub seat_ids: Vec<i64>,
    pub reservation_token: Option<Uuid>,
    #[validate(nested)]
    pub price_override: Option<PriceOverrideRequest>,
    /// Total computed by the client; advisory only.
    pub client_total: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PriceOverrideRequest {
    #[validate(range(min = 0, message = "override price must not be negative"))]
    pub price_per_seat: i64,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddSeatsRequest {
    #[validate(length(min = 1, message = "at least one seat is required"))]
    pub seat_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BookingWithSeats {
    #[serde(flatten)]
    pub booking: Booking,
    pub seats: Vec<BookingSeat>,
}

/* ---------- handlers ---------- */

// GET /api/bookings?user_id=&showtime_id=&status=
async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<BookingFilter>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.bookings.list(&filter).await?))
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let receipt = state
        .bookings
        .create_booking(CreateBooking {
            user_id: req.user_id,
            showtime_id: req.showtime_id,
            seat_ids: req.seat_ids,
            reservation_token: req.reservation_token,
            price_override: req.price_override.map(|o| PriceOverride {
                price_per_seat: o.price_per_seat,
                note: o.note,
            }),
            client_total: req.client_total,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

// GET /api/bookings/{id}
async fn get_booking(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    let booking = state.bookings.get(id).await?;
    let seats = state.bookings.seats(id).await?;
    Ok(Json(BookingWithSeats { booking, seats }))
}

// DELETE /api/bookings/{id}
async fn delete_booking(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    state.bookings.delete_booking(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// PATCH /api/bookings/{id}/status
async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.bookings.transition(id, req.status).await?))
}

// GET /api/bookings/{id}/seats
async fn booking_seats(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.bookings.seats(id).await?))
}

// POST /api/bookings/{id}/seats
async fn add_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AddSeatsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let (booking, _added) = state.bookings.add_seats(id, &req.seat_ids).await?;
    let seats = state.bookings.seats(id).await?;
    Ok((StatusCode::CREATED, Json(BookingWithSeats { booking, seats })))
}
