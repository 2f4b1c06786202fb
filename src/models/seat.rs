use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Seat {
    pub id: i64,
    pub studio_id: i64,
    pub row_label: String,
    pub number: i32,
    pub label: String,
}

/// Seat position produced by the layout model before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SeatSpec {
    pub row_label: String,
    pub number: i32,
}

impl SeatSpec {
    pub fn new(row_label: impl Into<String>, number: i32) -> Self {
        Self { row_label: row_label.into(), number }
    }

    pub fn label(&self) -> String {
        format!("{}{}", self.row_label, self.number)
    }
}

/// Occupancy of a seat for one showtime, as rendered on the seat map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatAvailability {
    Available,
    Held,
    Booked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatMapEntry {
    pub seat_id: i64,
    pub label: String,
    pub row_label: String,
    pub number: i32,
    pub status: SeatAvailability,
}
