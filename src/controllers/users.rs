use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::error::{ApiError, BookingError};
use crate::models::{NewUser, UserRole};
use crate::AppState;

// Стоимость bcrypt: баланс между скоростью регистрации и стойкостью
pub const PASSWORD_HASH_COST: u32 = 10;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email(message = "invalid email"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub role: Option<UserRole>,
}

// GET /api/users
async fn list_users(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_users().await?))
}

// POST /api/users
async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    // bcrypt тяжёлый, не блокируем рантайм
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, PASSWORD_HASH_COST))
        .await
        .map_err(|e| BookingError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| BookingError::Internal(format!("password hashing failed: {e}")))?;

    let user = state
        .store
        .insert_user(NewUser {
            name: req.name,
            email: req.email.to_lowercase(),
            password_hash,
            role: req.role.unwrap_or(UserRole::User),
        })
        .await?;
    info!("User {} registered", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

// GET /api/users/{id}
async fn get_user(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| BookingError::not_found("user", id))?;
    Ok(Json(user))
}
