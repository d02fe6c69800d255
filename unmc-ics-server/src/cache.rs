use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use unmc_ics_core::{Error, Result, cache::CacheBackend};

const DEFAULT_PREFIX: &str = "unmc_ics";

/// Redis-backed page cache shared by all requests.
#[derive(Clone)]
pub struct RedisCache {
    connection: redis::aio::ConnectionManager,
    prefix: String,
}

impl RedisCache {
    /// Connect to `redis_url`. The connection manager reconnects on its own after failures.
    pub async fn new(redis_url: &str, prefix: Option<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::Config(format!("Failed to create Redis client: {e}")))?;

        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::Config(format!("Failed to connect to Redis: {e}")))?;

        Ok(Self {
            connection,
            prefix: prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
        })
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

fn redis_error(action: &str, error: &redis::RedisError) -> Error {
    Error::Internal(format!("Redis {action} failed: {error}"))
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn set_raw(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(self.build_key(key), value, ttl.as_secs().max(1))
            .await
            .map_err(|e| redis_error("SETEX", &e))
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        conn.get(self.build_key(key))
            .await
            .map_err(|e| redis_error("GET", &e))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(self.build_key(key))
            .await
            .map_err(|e| redis_error("DEL", &e))
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.connection.clone();

        let keys: Vec<String> = conn
            .keys(format!("{}:*", self.prefix))
            .await
            .map_err(|e| redis_error("KEYS", &e))?;

        if !keys.is_empty() {
            tracing::info!("Clearing {} cached pages", keys.len());
            conn.del::<_, ()>(keys)
                .await
                .map_err(|e| redis_error("DEL", &e))?;
        }

        Ok(())
    }
}
