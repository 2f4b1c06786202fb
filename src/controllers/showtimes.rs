use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{Booking, NewShowtime, ShowtimeFilter};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/showtimes", get(list_showtimes).post(create_showtime))
        .route(
            "/showtimes/{id}",
            get(get_showtime).put(update_showtime).delete(delete_showtime),
        )
        .route("/showtimes/{id}/seats", get(seat_map))
}

#[derive(Debug, Deserialize)]
pub struct ShowtimeRequest {
    pub movie_id: i64,
    pub studio_id: i64,
    pub show_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price: i64,
}

impl From<ShowtimeRequest> for NewShowtime {
    fn from(req: ShowtimeRequest) -> Self {
        NewShowtime {
            movie_id: req.movie_id,
            studio_id: req.studio_id,
            show_date: req.show_date,
            start_time: req.start_time,
            end_time: req.end_time,
            price: req.price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct DeletedShowtimeResponse {
    pub id: i64,
    pub cancelled_bookings: Vec<Booking>,
}

// GET /api/showtimes?movie_id=&studio_id=&date=
async fn list_showtimes(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ShowtimeFilter>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.scheduler.list(&filter).await?))
}

// POST /api/showtimes
async fn create_showtime(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ShowtimeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let showtime = state
        .scheduler
        .schedule(req.movie_id, req.studio_id, req.show_date, req.start_time, req.end_time, req.price)
        .await?;
    Ok((StatusCode::CREATED, Json(showtime)))
}

// GET /api/showtimes/{id}
async fn get_showtime(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.scheduler.get(id).await?))
}

// PUT /api/showtimes/{id}
async fn update_showtime(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ShowtimeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let showtime = state.scheduler.reschedule(id, req.into()).await?;
    state.ledger.invalidate(id).await;
    Ok(Json(showtime))
}

// DELETE /api/showtimes/{id}?force=true
async fn delete_showtime(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<DeleteQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.scheduler.cancel_showtime(id, params.force).await?;
    state.ledger.invalidate(id).await;
    Ok(Json(DeletedShowtimeResponse {
        id,
        cancelled_bookings: deleted.cancelled_bookings,
    }))
}

// GET /api/showtimes/{id}/seats
async fn seat_map(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.ledger.seat_map(id).await?))
}
