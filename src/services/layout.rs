//! Studio layout model: derives the physical seat inventory of a studio
//! from its row / column configuration.
//!
//! Rows use a single-letter scheme (`A`..=`Z`), so a studio has at most 26
//! rows. Labels are always `row + number` and never edited on their own.

use crate::error::BookingError;
use crate::models::SeatSpec;

pub const MAX_ROWS: i32 = 26;

/// Validated row / column configuration of a studio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudioLayout {
    pub rows: i32,
    pub seats_per_row: i32,
}

impl StudioLayout {
    /// Checks bounds and, when the caller declares a total, that it agrees
    /// with `rows * seats_per_row`.
    pub fn new(rows: i32, seats_per_row: i32, declared_total: Option<i32>) -> Result<Self, BookingError> {
        if rows < 1 {
            return Err(BookingError::InvalidLayout(format!("rows must be at least 1, got {rows}")));
        }
        if seats_per_row < 1 {
            return Err(BookingError::InvalidLayout(format!(
                "seats per row must be at least 1, got {seats_per_row}"
            )));
        }
        if rows > MAX_ROWS {
            return Err(BookingError::InvalidLayout(format!(
                "at most {MAX_ROWS} rows are supported, got {rows}"
            )));
        }
        let computed = rows.checked_mul(seats_per_row).ok_or_else(|| {
            BookingError::InvalidLayout(format!("{rows} x {seats_per_row} seats is too large"))
        })?;

        if let Some(declared) = declared_total {
            if declared != computed {
                return Err(BookingError::LayoutMismatch {
                    declared,
                    rows,
                    seats_per_row,
                    computed,
                });
            }
        }

        Ok(Self { rows, seats_per_row })
    }

    pub fn total_seats(&self) -> i32 {
        self.rows * self.seats_per_row
    }

    /// Seats in row-major order: A1, A2, ..., B1, ...
    pub fn seats(&self) -> Vec<SeatSpec> {
        let mut seats = Vec::with_capacity(self.total_seats() as usize);
        for row in 0..self.rows {
            let label = row_label(row);
            for number in 1..=self.seats_per_row {
                seats.push(SeatSpec::new(label.clone(), number));
            }
        }
        seats
    }
}

/// Entry point for API input, where the client may send its own total.
pub fn validate_layout(
    rows: i32,
    seats_per_row: i32,
    declared_total: Option<i32>,
) -> Result<StudioLayout, BookingError> {
    StudioLayout::new(rows, seats_per_row, declared_total)
}

/// `generate_seats(rows, seats_per_row)` without a declared total.
pub fn generate_seats(rows: i32, seats_per_row: i32) -> Result<Vec<SeatSpec>, BookingError> {
    Ok(StudioLayout::new(rows, seats_per_row, None)?.seats())
}

// 0 -> "A", 25 -> "Z"
fn row_label(index: i32) -> String {
    char::from(b'A' + index as u8).to_string()
}
