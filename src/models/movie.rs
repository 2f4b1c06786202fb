use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "movie_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovieStatus {
    NowPlaying,
    ComingSoon,
    Ended,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub genre: String,
    pub duration_minutes: i32,
    pub rating: String,
    pub status: MovieStatus,
    pub release_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Полная замена полей фильма (create и update)
#[derive(Debug, Clone)]
pub struct MovieInput {
    pub title: String,
    pub genre: String,
    pub duration_minutes: i32,
    pub rating: String,
    pub status: MovieStatus,
    pub release_date: Option<NaiveDate>,
}
