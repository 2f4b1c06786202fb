use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub booking: BookingConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" | "plain" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected `pretty` or `json`, got `{other}`")),
        }
    }
}

// Настройки базы данных. Без URL работаем на in-memory хранилище
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
}

// Настройки Redis (кеш схемы зала, опционально)
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub seat_map_ttl_secs: u64,
}

// Настройки бронирования
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub hold_secs: i64,
    pub sweep_interval_secs: u64,
    pub code_attempts: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            hold_secs: 300,
            sweep_interval_secs: 30,
            code_attempts: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = BookingConfig::default();
        let config = Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("PORT", 8000)?,
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "cinema_booking=debug,tower_http=debug".to_string()),
                log_format: parse_var("LOG_FORMAT", LogFormat::Pretty)?,
            },
            database: DatabaseConfig {
                url: optional_var("DATABASE_URL"),
                pool_size: parse_var("DB_POOL_SIZE", 20)?,
            },
            redis: RedisConfig {
                url: optional_var("REDIS_URL"),
                seat_map_ttl_secs: parse_var("SEAT_MAP_CACHE_TTL_SECS", 5)?,
            },
            booking: BookingConfig {
                hold_secs: parse_var("BOOKING_HOLD_SECS", defaults.hold_secs)?,
                sweep_interval_secs: parse_var("HOLD_SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
                code_attempts: parse_var("BOOKING_CODE_ATTEMPTS", defaults.code_attempts)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.booking.hold_secs < 1 {
            return Err(ConfigError::Invalid {
                key: "BOOKING_HOLD_SECS",
                value: self.booking.hold_secs.to_string(),
                reason: "hold must be at least one second".into(),
            });
        }
        if self.booking.sweep_interval_secs < 1 {
            return Err(ConfigError::Invalid {
                key: "HOLD_SWEEP_INTERVAL_SECS",
                value: self.booking.sweep_interval_secs.to_string(),
                reason: "interval must be at least one second".into(),
            });
        }
        if self.booking.code_attempts < 1 {
            return Err(ConfigError::Invalid {
                key: "BOOKING_CODE_ATTEMPTS",
                value: self.booking.code_attempts.to_string(),
                reason: "at least one attempt is required".into(),
            });
        }
        Ok(())
    }

    /// Defaults for tests and embedded use: in-memory store, no cache.
    pub fn in_memory() -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".into(),
                port: 0,
                environment: "test".into(),
                rust_log: "cinema_booking=debug".into(),
                log_format: LogFormat::Pretty,
            },
            database: DatabaseConfig { url: None, pool_size: 5 },
            redis: RedisConfig { url: None, seat_map_ttl_secs: 5 },
            booking: BookingConfig::default(),
        }
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
