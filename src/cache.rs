use crate::models::SeatMapEntry;
use crate::redis_client::RedisClient;
use redis::AsyncCommands;
use tracing::{debug, warn};

/// Short-lived Redis copy of rendered seat maps. Without Redis every call
/// is a no-op and readers always go to the ledger.
#[derive(Clone)]
pub struct SeatMapCache {
    redis: Option<RedisClient>,
    ttl_secs: u64,
}

impl SeatMapCache {
    pub fn new(redis: RedisClient, ttl_secs: u64) -> Self {
        Self {
            redis: Some(redis),
            ttl_secs: ttl_secs.max(1),
        }
    }

    pub fn disabled() -> Self {
        Self { redis: None, ttl_secs: 0 }
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }

    // Получить схему зала из кеша; любая ошибка Redis = промах
    pub async fn get(&self, showtime_id: i64) -> Option<Vec<SeatMapEntry>> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.conn.clone();
        let data: Option<String> = match conn.get(key(showtime_id)).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Seat map cache read failed for showtime {}: {}", showtime_id, e);
                return None;
            }
        };
        let seats = serde_json::from_str(&data?).ok()?;
        debug!("Seat map cache hit for showtime {}", showtime_id);
        Some(seats)
    }

    pub async fn put(&self, showtime_id: i64, seats: &[SeatMapEntry]) {
        let Some(redis) = self.redis.as_ref() else { return };
        let data = match serde_json::to_string(seats) {
            Ok(data) => data,
            Err(e) => {
                warn!("Seat map for showtime {} not serializable: {}", showtime_id, e);
                return;
            }
        };
        let mut conn = redis.conn.clone();
        let result: Result<(), _> = conn.set_ex(key(showtime_id), data, self.ttl_secs).await;
        if let Err(e) = result {
            warn!("Seat map cache write failed for showtime {}: {}", showtime_id, e);
        }
    }

    // Инвалидировать кеш мест
    pub async fn invalidate(&self, showtime_id: i64) {
        let Some(redis) = self.redis.as_ref() else { return };
        let mut conn = redis.conn.clone();
        let result: Result<(), _> = conn.del(key(showtime_id)).await;
        match result {
            Ok(()) => debug!("Invalidated seat map cache for showtime {}", showtime_id),
            Err(e) => warn!("Failed to invalidate seat map for showtime {}: {}", showtime_id, e),
        }
    }
}

fn key(showtime_id: i64) -> String {
    format!("seatmap:{}", showtime_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_cache_is_noop() {
        let cache = SeatMapCache::disabled();
        assert!(!cache.is_enabled());
        cache.put(1, &[]).await;
        assert!(cache.get(1).await.is_none());
        cache.invalidate(1).await;
    }

    #[test]
    fn test_key_format() {
        assert_eq!(key(42), "seatmap:42");
    }
}
