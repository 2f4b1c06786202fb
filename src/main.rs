use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_booking::{
    app,
    cache::SeatMapCache,
    clock::SystemClock,
    config::{Config, LogFormat},
    database::Database,
    redis_client::RedisClient,
    store::{MemoryStore, PgStore, Store},
    AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("invalid configuration")?;

    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&config.app.rust_log));
    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    info!("Starting Cinema Booking API ({})", config.app.environment);

    // Postgres, если задан DATABASE_URL, иначе всё в памяти
    let (store, backend): (Arc<dyn Store>, &'static str) = match &config.database.url {
        Some(url) => {
            let db = Database::new(url, config.database.pool_size)
                .await
                .context("failed to connect to database")?;
            db.run_migrations().await.context("failed to run migrations")?;
            info!("Database connected");
            (Arc::new(PgStore::new(db)), "postgres")
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store");
            (Arc::new(MemoryStore::new()), "memory")
        }
    };

    // Redis опционален: без него схема зала не кешируется
    let cache = match &config.redis.url {
        Some(url) => match RedisClient::new(url).await {
            Ok(redis) => SeatMapCache::new(redis, config.redis.seat_map_ttl_secs),
            Err(e) => {
                warn!("Redis unavailable ({}), seat map cache disabled", e);
                SeatMapCache::disabled()
            }
        },
        None => SeatMapCache::disabled(),
    };

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("invalid HOST/PORT")?;
    let sweep_interval = Duration::from_secs(config.booking.sweep_interval_secs);

    let state = AppState::new(config, store, backend, cache, Arc::new(SystemClock));

    // --- Start background tasks ---
    state.sweeper().spawn(sweep_interval);

    // --- Start the web server ---
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
