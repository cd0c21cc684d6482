use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError};
use tokio::sync::RwLock;

/// Shared Redis connection. Every operation degrades gracefully when
/// the connection is absent: rate limits allow, cache reads miss,
/// cache writes are dropped.
#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        *self.manager.write().await = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        *self.manager.write().await = None;
    }

    async fn live_manager(&self) -> Option<ConnectionManager> {
        self.manager.read().await.clone()
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let Some(mut manager) = self.live_manager().await else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    /// Fixed-window counter; returns false once the window is over the
    /// limit. Allows everything while Redis is down.
    pub(crate) async fn rate_limit(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<bool, RedisError> {
        let Some(mut manager) = self.live_manager().await else {
            return Ok(true);
        };

        let script = redis::Script::new(
            r#"
            local current = redis.call("INCR", KEYS[1])
            if current == 1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return current
        "#,
        );

        let current: i64 =
            script.key(key).arg(window_seconds as i64).invoke_async(&mut manager).await?;

        Ok(current <= limit as i64)
    }

    /// Read a cached JSON blob. Returns None when the cache is down or cold.
    pub(crate) async fn cache_get(&self, key: &str) -> Option<String> {
        let mut manager = self.live_manager().await?;

        match cmd("GET").arg(key).query_async::<_, Option<String>>(&mut manager).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, key, "Cache read failed");
                None
            }
        }
    }

    pub(crate) async fn cache_set(&self, key: &str, value: &str, ttl_seconds: u64) {
        let Some(mut manager) = self.live_manager().await else {
            return;
        };

        if let Err(err) = cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<_, ()>(&mut manager)
            .await
        {
            tracing::warn!(error = %err, key, "Cache write failed");
        }
    }

    pub(crate) async fn cache_invalidate(&self, key: &str) {
        let Some(mut manager) = self.live_manager().await else {
            return;
        };

        if let Err(err) = cmd("DEL").arg(key).query_async::<_, ()>(&mut manager).await {
            tracing::warn!(error = %err, key, "Cache invalidation failed");
        }
    }
}
