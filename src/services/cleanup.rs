use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::clock::Clock;
use crate::services::ledger::SeatReservationLedger;
use crate::services::lifecycle::BookingLifecycle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub expired_holds: usize,
    pub released_seats: usize,
    pub cancelled_bookings: usize,
    pub completed_bookings: usize,
}

impl SweepStats {
    pub fn is_empty(&self) -> bool {
        *self == SweepStats::default()
    }
}

/// Periodic release of expired holds and completion of finished showtimes.
#[derive(Clone)]
pub struct HoldSweeper {
    ledger: SeatReservationLedger,
    bookings: BookingLifecycle,
    clock: Arc<dyn Clock>,
}

impl HoldSweeper {
    pub fn new(ledger: SeatReservationLedger, bookings: BookingLifecycle, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, bookings, clock }
    }

    /// Один проход очистки: истёкшие холды, затем завершённые сеансы
    pub async fn run_once(&self) -> SweepStats {
        let now = self.clock.now();
        let mut stats = SweepStats::default();

        match self.ledger.expire_stale_holds(now).await {
            Ok(expired) => {
                stats.expired_holds = expired.len();
                stats.released_seats = expired.iter().map(|h| h.seat_ids.len()).sum();
                stats.cancelled_bookings = expired.iter().filter(|h| h.booking_id.is_some()).count();
            }
            Err(e) => error!("🧹 Hold sweep failed: {}", e),
        }

        match self.bookings.complete_finished(now).await {
            Ok(completed) => {
                stats.completed_bookings = completed.len();
                for booking in &completed {
                    info!("🎬 Booking {} completed after showtime {}", booking.booking_code, booking.showtime_id);
                }
            }
            Err(e) => error!("🧹 Completing finished bookings failed: {}", e),
        }

        if !stats.is_empty() {
            info!(
                expired_holds = stats.expired_holds,
                released_seats = stats.released_seats,
                cancelled_bookings = stats.cancelled_bookings,
                completed_bookings = stats.completed_bookings,
                "✅ Sweep finished"
            );
        }
        stats
    }

    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        info!("🧹 Hold sweeper started, every {:?}", interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }
}
