use sqlx::{postgres::PgPoolOptions, PgPool, Pool, Postgres};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            // Не ждём соединение бесконечно
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        info!("Postgres pool ready ({} connections max)", pool_size);
        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed");
        Ok(())
    }
}

// Пул, созданный снаружи (например, #[sqlx::test])
impl From<PgPool> for Database {
    fn from(pool: PgPool) -> Self {
        Database { pool }
    }
}
