use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Studio {
    pub id: i64,
    pub name: String,
    pub row_count: i32,
    pub seats_per_row: i32,
    pub total_seats: i32,
    pub created_at: DateTime<Utc>,
}

/// A studio whose layout has already been validated by the layout model.
#[derive(Debug, Clone)]
pub struct NewStudio {
    pub name: String,
    pub row_count: i32,
    pub seats_per_row: i32,
    pub total_seats: i32,
}
