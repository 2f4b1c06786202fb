use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::services::ledger::MAX_HOLD_SECS;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reservations", post(reserve_seats))
        .route("/reservations/{token}", get(get_reservation).delete(release_reservation))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReserveRequest {
    pub showtime_id: i64,
    #[validate(length(min = 1, message = "at least one seat is required"))]
    pub seat_ids: Vec<i64>,
    #[validate(range(min = 1, max = MAX_HOLD_SECS))]
    pub hold_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub token: Uuid,
    pub released_seats: usize,
}

// POST /api/reservations
async fn reserve_seats(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReserveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let hold = req.hold_seconds.map(Duration::seconds);
    let token = state.ledger.reserve(req.showtime_id, &req.seat_ids, hold).await?;
    Ok((StatusCode::CREATED, Json(token)))
}

// GET /api/reservations/{token}
async fn get_reservation(
    State(state): State<Arc<AppState>>,
    Path(token): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.ledger.hold(token).await?))
}

// DELETE /api/reservations/{token}
async fn release_reservation(
    State(state): State<Arc<AppState>>,
    Path(token): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let released_seats = state.ledger.abandon(token).await?;
    Ok(Json(ReleaseResponse { token, released_seats }))
}
