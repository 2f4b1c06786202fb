use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::error::{ApiError, BookingError};
use crate::models::{NewStudio, Seat, Studio};
use crate::services::layout::validate_layout;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/studios", get(list_studios).post(create_studio))
        .route("/studios/{id}", get(get_studio).put(rename_studio).delete(delete_studio))
        .route("/studios/{id}/seats", get(list_seats))
        .route("/studios/{id}/seats/generate", post(regenerate_seats))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudioRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    pub rows: i32,
    pub seats_per_row: i32,
    /// Optional declared capacity, checked against `rows * seats_per_row`.
    pub total_seats: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenameStudioRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LayoutRequest {
    pub rows: i32,
    pub seats_per_row: i32,
    pub total_seats: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct StudioWithSeats {
    #[serde(flatten)]
    pub studio: Studio,
    pub seats: Vec<Seat>,
}

// GET /api/studios
async fn list_studios(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_studios().await?))
}

// POST /api/studios
async fn create_studio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStudioRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let layout = validate_layout(req.rows, req.seats_per_row, req.total_seats)?;

    let (studio, seats) = state
        .store
        .insert_studio(
            NewStudio {
                name: req.name,
                row_count: layout.rows,
                seats_per_row: layout.seats_per_row,
                total_seats: layout.total_seats(),
            },
            layout.seats(),
        )
        .await?;

    info!("Studio {} created with {} seats", studio.id, seats.len());
    Ok((StatusCode::CREATED, Json(StudioWithSeats { studio, seats })))
}

// GET /api/studios/{id}
async fn get_studio(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    let studio = state
        .store
        .get_studio(id)
        .await?
        .ok_or_else(|| BookingError::not_found("studio", id))?;
    let seats = state.store.list_seats(id).await?;
    Ok(Json(StudioWithSeats { studio, seats }))
}

// PUT /api/studios/{id}
async fn rename_studio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<RenameStudioRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    Ok(Json(state.store.rename_studio(id, req.name).await?))
}

// DELETE /api/studios/{id}
async fn delete_studio(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    state.store.delete_studio(id).await?;
    info!("Studio {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/studios/{id}/seats
async fn list_seats(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_seats(id).await?))
}

// POST /api/studios/{id}/seats/generate
async fn regenerate_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<LayoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let layout = validate_layout(req.rows, req.seats_per_row, req.total_seats)?;
    let (studio, seats) = state.store.replace_layout(id, layout, layout.seats()).await?;
    info!("Studio {} re-laid out as {}x{}", id, layout.rows, layout.seats_per_row);
    Ok(Json(StudioWithSeats { studio, seats }))
}
