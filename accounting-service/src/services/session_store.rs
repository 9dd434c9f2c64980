use async_trait::async_trait;
use dashmap::DashMap;
use redis::{aio::ConnectionManager, Client, Script};
use serde::{Deserialize, Serialize};

use crate::models::Principal;

/// The one current session of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    pub principal: Principal,
    /// Unix seconds, copied from the token's `exp`.
    pub expires_at: i64,
}

/// Keyed by session key; at most one record per key. Every operation is
/// atomic on its key.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Replaces whatever session the key held.
    async fn put(&self, key: &str, record: &SessionRecord, ttl_seconds: i64) -> Result<(), anyhow::Error>;
    async fn get(&self, key: &str) -> Result<Option<SessionRecord>, anyhow::Error>;
    async fn remove(&self, key: &str) -> Result<(), anyhow::Error>;
    /// Removes the session only if it still holds `token`; returns whether
    /// anything was removed. A newer login is never purged by an old token.
    async fn remove_if_current(&self, key: &str, token: &str) -> Result<bool, anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

const KEY_PREFIX: &str = "session:";

const COMPARE_AND_DELETE: &str = r#"
local stored = redis.call('GET', KEYS[1])
if stored then
    local record = cjson.decode(stored)
    if record['token'] == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
end
return 0
"#;

#[derive(Clone)]
pub struct RedisSessionStore {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn new(url: &str) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis session store");
        let client = Client::open(url)?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }

    fn key(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, key: &str, record: &SessionRecord, ttl_seconds: i64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let value = serde_json::to_string(record)?;

        redis::cmd("SET")
            .arg(Self::key(key))
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds.max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to store session: {}", e))
    }

    async fn get(&self, key: &str) -> Result<Option<SessionRecord>, anyhow::Error> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read session: {}", e))?;

        raw.map(|r| serde_json::from_str(&r).map_err(anyhow::Error::from))
            .transpose()
    }

    async fn remove(&self, key: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(Self::key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to remove session: {}", e))
    }

    async fn remove_if_current(&self, key: &str, token: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let removed: i64 = Script::new(COMPARE_AND_DELETE)
            .key(Self::key(key))
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to purge session: {}", e))?;

        Ok(removed > 0)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// Single-process session store. TTLs are not enforced here; expiry is
/// decided from the token itself.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, key: &str, record: &SessionRecord, _ttl_seconds: i64) -> Result<(), anyhow::Error> {
        self.sessions.insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<SessionRecord>, anyhow::Error> {
        Ok(self.sessions.get(key).map(|entry| entry.value().clone()))
    }

    async fn remove(&self, key: &str) -> Result<(), anyhow::Error> {
        self.sessions.remove(key);
        Ok(())
    }

    async fn remove_if_current(&self, key: &str, token: &str) -> Result<bool, anyhow::Error> {
        Ok(self
            .sessions
            .remove_if(key, |_, record| record.token == token)
            .is_some())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
