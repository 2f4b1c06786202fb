pub mod cache;
pub mod clock;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use axum::{routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use cache::SeatMapCache;
use clock::{Clock, SystemClock};
use services::{
    booking_code::BookingCodeGenerator, cleanup::HoldSweeper, ledger::SeatReservationLedger,
    lifecycle::BookingLifecycle, scheduler::ShowtimeScheduler,
};
use store::{MemoryStore, Store};

// Shared state для всего приложения
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: SeatMapCache,
    pub config: config::Config,
    pub clock: Arc<dyn Clock>,
    pub ledger: SeatReservationLedger,
    pub scheduler: ShowtimeScheduler,
    pub bookings: BookingLifecycle,
    /// "postgres" or "memory", reported by /health.
    pub backend: &'static str,
}

impl AppState {
    pub fn new(
        config: config::Config,
        store: Arc<dyn Store>,
        backend: &'static str,
        cache: SeatMapCache,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let ledger = SeatReservationLedger::new(
            store.clone(),
            clock.clone(),
            cache.clone(),
            chrono::Duration::seconds(config.booking.hold_secs),
        );
        let codes = Arc::new(BookingCodeGenerator::new(config.booking.code_attempts));
        let bookings = BookingLifecycle::new(store.clone(), ledger.clone(), codes, clock.clone());
        let scheduler = ShowtimeScheduler::new(store.clone(), clock.clone());

        Arc::new(Self {
            store,
            cache,
            config,
            clock,
            ledger,
            scheduler,
            bookings,
            backend,
        })
    }

    /// In-memory store, no cache, wall clock.
    pub fn in_memory(config: config::Config) -> Arc<Self> {
        Self::new(
            config,
            Arc::new(MemoryStore::new()),
            "memory",
            SeatMapCache::disabled(),
            Arc::new(SystemClock),
        )
    }

    pub fn sweeper(&self) -> HoldSweeper {
        HoldSweeper::new(self.ledger.clone(), self.bookings.clone(), self.clock.clone())
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Cinema Booking API v1.0" }))
        .route("/health", get(health))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health(axum::extract::State(state): axum::extract::State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "store": state.backend,
        "seat_map_cache": state.cache.is_enabled(),
    }))
}
