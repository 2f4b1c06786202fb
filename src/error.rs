use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::BookingStatus;

/// Failures of the booking core. Everything except `Storage` and `Internal`
/// is a domain outcome the caller is expected to react to.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    #[error("layout mismatch: declared {declared} seats but {rows} rows x {seats_per_row} seats gives {computed}")]
    LayoutMismatch {
        declared: i32,
        rows: i32,
        seats_per_row: i32,
        computed: i32,
    },

    #[error("showtime collides with showtime {conflicting_id} ({start}-{end})")]
    ScheduleConflict {
        conflicting_id: i64,
        start: NaiveTime,
        end: NaiveTime,
    },

    #[error("invalid time range: start {start} is not before end {end}")]
    InvalidTimeRange { start: NaiveTime, end: NaiveTime },

    #[error("showtime {showtime_id} has {active} active booking(s)")]
    ShowtimeHasBookings { showtime_id: i64, active: usize },

    #[error("seats already taken for showtime {showtime_id}: {seat_ids:?}")]
    SeatConflict { showtime_id: i64, seat_ids: Vec<i64> },

    #[error("invalid seat count: {0}")]
    InvalidSeatCount(i64),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("no unique booking code after {attempts} attempts")]
    CodeGenerationExhausted { attempts: u32 },

    #[error("booking code {0} already exists")]
    DuplicateBookingCode(String),

    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("showtime {showtime_id} has not ended yet (ends at {ends_at})")]
    ShowtimeNotEnded { showtime_id: i64, ends_at: NaiveDateTime },

    #[error("reservation {0} has expired or was released")]
    HoldExpired(Uuid),

    #[error("{resource} {id} is still referenced by {by}")]
    ResourceInUse {
        resource: &'static str,
        id: String,
        by: &'static str,
    },

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BookingError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        BookingError::NotFound { resource, id: id.to_string() }
    }

    pub fn in_use(resource: &'static str, id: impl ToString, by: &'static str) -> Self {
        BookingError::ResourceInUse { resource, id: id.to_string(), by }
    }

    /// Stable machine-readable kind, used as the `error` field of API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::InvalidLayout(_) => "invalid_layout",
            BookingError::LayoutMismatch { .. } => "layout_mismatch",
            BookingError::ScheduleConflict { .. } => "schedule_conflict",
            BookingError::InvalidTimeRange { .. } => "invalid_time_range",
            BookingError::ShowtimeHasBookings { .. } => "showtime_has_bookings",
            BookingError::SeatConflict { .. } => "seat_conflict",
            BookingError::InvalidSeatCount(_) => "invalid_seat_count",
            BookingError::InvalidPrice(_) => "invalid_price",
            BookingError::CodeGenerationExhausted { .. } => "code_generation_exhausted",
            BookingError::DuplicateBookingCode(_) => "duplicate_booking_code",
            BookingError::InvalidTransition { .. } => "invalid_transition",
            BookingError::ShowtimeNotEnded { .. } => "showtime_not_ended",
            BookingError::HoldExpired(_) => "hold_expired",
            BookingError::ResourceInUse { .. } => "resource_in_use",
            BookingError::NotFound { .. } => "not_found",
            BookingError::Validation(_) => "validation_error",
            BookingError::Storage(_) => "storage_error",
            BookingError::Internal(_) => "internal_error",
        }
    }

    pub fn is_domain(&self) -> bool {
        !matches!(self, BookingError::Storage(_) | BookingError::Internal(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BookingError::ScheduleConflict { .. }
            | BookingError::ShowtimeHasBookings { .. }
            | BookingError::SeatConflict { .. }
            | BookingError::InvalidTransition { .. }
            | BookingError::ShowtimeNotEnded { .. }
            | BookingError::ResourceInUse { .. }
            | BookingError::DuplicateBookingCode(_) => StatusCode::CONFLICT,
            BookingError::HoldExpired(_) => StatusCode::GONE,
            BookingError::InvalidLayout(_)
            | BookingError::LayoutMismatch { .. }
            | BookingError::InvalidTimeRange { .. }
            | BookingError::InvalidSeatCount(_)
            | BookingError::InvalidPrice(_)
            | BookingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::CodeGenerationExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            BookingError::Storage(_) | BookingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Structured details so the client can react without parsing the message
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            BookingError::SeatConflict { showtime_id, seat_ids } => {
                Some(json!({ "showtime_id": showtime_id, "seat_ids": seat_ids }))
            }
            BookingError::ScheduleConflict { conflicting_id, start, end } => Some(json!({
                "conflicting_showtime_id": conflicting_id,
                "start_time": start,
                "end_time": end,
            })),
            BookingError::ShowtimeHasBookings { showtime_id, active } => {
                Some(json!({ "showtime_id": showtime_id, "active_bookings": active }))
            }
            BookingError::InvalidTransition { from, to } => Some(json!({ "from": from, "to": to })),
            BookingError::LayoutMismatch { declared, computed, .. } => {
                Some(json!({ "declared": declared, "computed": computed }))
            }
            BookingError::ShowtimeNotEnded { showtime_id, ends_at } => {
                Some(json!({ "showtime_id": showtime_id, "ends_at": ends_at }))
            }
            BookingError::HoldExpired(token) => Some(json!({ "reservation_token": token })),
            _ => None,
        }
    }
}

/// HTTP-facing error. Domain errors keep their kind; request validation is
/// reported field by field.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] BookingError),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<ValidationDetail>,
    },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Domain(err) => {
                let status = err.status();
                let body = if err.is_domain() {
                    ErrorBody {
                        error: err.kind().into(),
                        message: err.to_string(),
                        details: err.details(),
                    }
                } else {
                    tracing::error!("Internal error: {}", err);
                    ErrorBody {
                        error: err.kind().into(),
                        message: "An internal error occurred".into(),
                        details: None,
                    }
                };
                (status, body)
            }
            ApiError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "validation_error".into(),
                    message,
                    details: serde_json::to_value(details).ok(),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        let message = if details.len() == 1 {
            format!("{}: {}", details[0].field, details[0].message)
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::Validation { message, details }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_conflict_is_409() {
        let err = ApiError::from(BookingError::SeatConflict { showtime_id: 1, seat_ids: vec![3, 4] });
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_found_is_404() {
        let err = ApiError::from(BookingError::not_found("booking", 7));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_layout_errors_are_422() {
        let err = ApiError::from(BookingError::InvalidLayout("rows must be >= 1".into()));
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_storage_error_is_500_and_not_domain() {
        let err = BookingError::Storage(sqlx::Error::PoolTimedOut);
        assert!(!err.is_domain());
        assert_eq!(err.kind(), "storage_error");
        assert_eq!(ApiError::from(err).into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_kinds_are_distinct_for_domain_errors() {
        let errors = [
            BookingError::InvalidLayout(String::new()),
            BookingError::LayoutMismatch { declared: 1, rows: 1, seats_per_row: 2, computed: 2 },
            BookingError::ScheduleConflict {
                conflicting_id: 1,
                start: NaiveTime::MIN,
                end: NaiveTime::MIN,
            },
            BookingError::ShowtimeHasBookings { showtime_id: 1, active: 1 },
            BookingError::SeatConflict { showtime_id: 1, seat_ids: vec![] },
            BookingError::InvalidSeatCount(0),
            BookingError::CodeGenerationExhausted { attempts: 5 },
            BookingError::InvalidTransition {
                from: BookingStatus::Cancelled,
                to: BookingStatus::Confirmed,
            },
            BookingError::ShowtimeNotEnded {
                showtime_id: 1,
                ends_at: NaiveDateTime::MIN,
            },
            BookingError::not_found("seat", 1),
        ];
        let mut kinds: Vec<_> = errors.iter().map(|e| e.kind()).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            BookingError::InvalidSeatCount(0).to_string(),
            "invalid seat count: 0"
        );
        assert_eq!(
            BookingError::not_found("showtime", 42).to_string(),
            "showtime 42 not found"
        );
    }
}
