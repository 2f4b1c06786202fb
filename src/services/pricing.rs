//! Booking totals in integer currency subunits.
//!
//! The showtime price is authoritative unless an explicit per-seat override
//! is supplied. Totals sent by clients are never trusted; they are compared
//! against the server computation and only logged on mismatch.

use serde::Serialize;
use tracing::warn;

use crate::error::BookingError;

/// Manual per-seat price correction, recorded on the booking for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceOverride {
    pub price_per_seat: i64,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub seat_count: i32,
    pub default_price_per_seat: i64,
    pub price_per_seat: i64,
    pub total: i64,
    pub overridden: bool,
    pub override_note: Option<String>,
}

/// `seat_count * price_per_seat`, rejecting empty bookings, negative prices
/// and overflow.
pub fn compute_total(seat_count: i64, price_per_seat: i64) -> Result<i64, BookingError> {
    if seat_count < 1 {
        return Err(BookingError::InvalidSeatCount(seat_count));
    }
    if price_per_seat < 0 {
        return Err(BookingError::InvalidPrice(format!(
            "price per seat must not be negative, got {price_per_seat}"
        )));
    }
    seat_count
        .checked_mul(price_per_seat)
        .ok_or_else(|| BookingError::InvalidPrice(format!("{seat_count} x {price_per_seat} overflows")))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PricingCalculator;

impl PricingCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn quote(
        &self,
        seat_count: usize,
        showtime_price: i64,
        price_override: Option<&PriceOverride>,
    ) -> Result<PriceQuote, BookingError> {
        let seat_count_i32 =
            i32::try_from(seat_count).map_err(|_| BookingError::InvalidSeatCount(seat_count as i64))?;
        let (price_per_seat, overridden, override_note) = match price_override {
            Some(o) => (o.price_per_seat, true, o.note.clone()),
            None => (showtime_price, false, None),
        };
        let total = compute_total(seat_count as i64, price_per_seat)?;

        if overridden {
            warn!(
                default_price = showtime_price,
                override_price = price_per_seat,
                seat_count,
                note = override_note.as_deref().unwrap_or(""),
                "Manual price override applied"
            );
        }

        Ok(PriceQuote {
            seat_count: seat_count_i32,
            default_price_per_seat: showtime_price,
            price_per_seat,
            total,
            overridden,
            override_note,
        })
    }

    /// Client totals are advisory. Returns `true` when the client agreed with
    /// the server, logs and returns `false` otherwise.
    pub fn check_client_total(&self, quote: &PriceQuote, client_total: Option<i64>) -> bool {
        match client_total {
            Some(sent) if sent != quote.total => {
                warn!(
                    client_total = sent,
                    server_total = quote.total,
                    "Client-computed total ignored"
                );
                false
            }
            _ => true,
        }
    }
}
