//! Read-through cache for number records.
//!
//! Records are cached under two keys, one by id and one by the number
//! string. Cache failures never fail a request; callers fall back to
//! the database.

use crate::error::StoreError;
use crate::types::Number;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Cache key for a record by id.
pub fn id_key(id: &Uuid) -> String {
    format!("number:number:{}", id)
}

/// Cache key for a record by its number string.
pub fn number_key(number: &str) -> String {
    format!("number:number_number:{}", number)
}

#[async_trait]
pub trait NumberCache: Send + Sync {
    async fn get(&self, id: &Uuid) -> Result<Option<Number>, StoreError>;

    async fn get_by_number(&self, number: &str) -> Result<Option<Number>, StoreError>;

    /// Store a record under both keys.
    async fn set(&self, number: &Number) -> Result<(), StoreError>;
}

struct CacheEntry {
    payload: String,
    expires_at: Instant,
}

/// In-process cache with TTL expiration. Used when no redis is configured
/// and in tests.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        info!("In-memory number cache initialized (ttl={:?})", ttl);
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Spawn a background task that purges expired entries every
    /// `interval`. The task holds a handle to the map, so abort it to
    /// release the cache.
    pub fn spawn_cleanup(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            cache.cleanup_loop(interval).await;
        })
    }

    async fn cleanup_loop(&self, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;
            self.purge_expired().await;
        }
    }

    async fn get_key(&self, key: &str) -> Result<Option<Number>, StoreError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => {
                    return Ok(Some(serde_json::from_str(&entry.payload)?))
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired. Another writer may have refreshed it in between.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    /// Drop expired entries.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);

        let removed = before - entries.len();
        if removed > 0 {
            debug!("Purged {} expired cache entries", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}

#[async_trait]
impl NumberCache for MemoryCache {
    async fn get(&self, id: &Uuid) -> Result<Option<Number>, StoreError> {
        self.get_key(&id_key(id)).await
    }

    async fn get_by_number(&self, number: &str) -> Result<Option<Number>, StoreError> {
        self.get_key(&number_key(number)).await
    }

    async fn set(&self, number: &Number) -> Result<(), StoreError> {
        let payload = serde_json::to_string(number)?;
        let expires_at = Instant::now() + self.ttl;

        let mut entries = self.entries.write().await;
        entries.insert(
            id_key(&number.id),
            CacheEntry {
                payload: payload.clone(),
                expires_at,
            },
        );
        entries.insert(
            number_key(&number.number),
            CacheEntry {
                payload,
                expires_at,
            },
        );
        Ok(())
    }
}

/// Redis backed cache storing JSON values with an expiry.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    ttl: Duration,
}

impl RedisCache {
    pub fn new(url: &str, ttl: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        info!("Redis number cache configured (ttl={:?})", ttl);
        Ok(Self { client, ttl })
    }

    async fn get_key(&self, key: &str) -> Result<Option<Number>, StoreError> {
        let mut connection = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = connection.get(key).await?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl NumberCache for RedisCache {
    #[instrument(skip(self))]
    async fn get(&self, id: &Uuid) -> Result<Option<Number>, StoreError> {
        self.get_key(&id_key(id)).await
    }

    #[instrument(skip(self))]
    async fn get_by_number(&self, number: &str) -> Result<Option<Number>, StoreError> {
        self.get_key(&number_key(number)).await
    }

    #[instrument(skip(self, number), fields(id = %number.id))]
    async fn set(&self, number: &Number) -> Result<(), StoreError> {
        let payload = serde_json::to_string(number)?;
        let seconds = self.ttl.as_secs().max(1);

        let mut connection = self.client.get_multiplexed_async_connection().await?;
        () = connection
            .set_ex(id_key(&number.id), payload.as_str(), seconds)
            .await?;
        () = connection
            .set_ex(number_key(&number.number), payload.as_str(), seconds)
            .await?;
        Ok(())
    }
}
