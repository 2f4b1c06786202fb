use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::{ApiError, BookingError};
use crate::models::{MovieInput, MovieStatus};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/{id}", get(get_movie).put(update_movie).delete(delete_movie))
}

#[derive(Debug, Deserialize)]
pub struct MoviesQuery {
    pub status: Option<MovieStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MovieRequest {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 50))]
    pub genre: String,
    #[validate(range(min = 1, max = 1000, message = "duration must be 1-1000 minutes"))]
    pub duration_minutes: i32,
    #[validate(length(min = 1, max = 10))]
    pub rating: String,
    pub status: MovieStatus,
    pub release_date: Option<NaiveDate>,
}

impl From<MovieRequest> for MovieInput {
    fn from(req: MovieRequest) -> Self {
        MovieInput {
            title: req.title,
            genre: req.genre,
            duration_minutes: req.duration_minutes,
            rating: req.rating,
            status: req.status,
            release_date: req.release_date,
        }
    }
}

// GET /api/movies?status=
async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MoviesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_movies(params.status).await?))
}

// POST /api/movies
async fn create_movie(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MovieRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let movie = state.store.insert_movie(req.into()).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

// GET /api/movies/{id}
async fn get_movie(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    let movie = state
        .store
        .get_movie(id)
        .await?
        .ok_or_else(|| BookingError::not_found("movie", id))?;
    Ok(Json(movie))
}

// PUT /api/movies/{id}
async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<MovieRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    Ok(Json(state.store.update_movie(id, req.into()).await?))
}

// DELETE /api/movies/{id}
async fn delete_movie(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    state.store.delete_movie(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
