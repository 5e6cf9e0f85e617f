use redis::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AppResult;

/// Most writes sent to Redis in one pipeline
const MAX_WRITE_BATCH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Resolved catalog metadata for one video id
    Video(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Video(id) => write!(f, "video:{}", id),
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

struct CacheWrite {
    key: String,
    value: String,
    ttl: u64,
}

/// Redis cache with batched reads and a background pipelined writer
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWrite>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Signals the writer task and waits until queued writes are flushed
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
    }
}

impl Cache {
    pub fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        let task = tokio::spawn(async move {
            Self::writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        (cache, CacheWriterHandle { shutdown_tx, task })
    }

    /// Groups whatever is queued into pipelines of at most `MAX_WRITE_BATCH`
    async fn writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWrite>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(first) = write_rx.recv() => {
                    let mut batch = vec![first];
                    while batch.len() < MAX_WRITE_BATCH {
                        match write_rx.try_recv() {
                            Ok(write) => batch.push(write),
                            Err(_) => break,
                        }
                    }
                    Self::flush(&client, &batch).await;
                }
                _ = shutdown_rx.recv() => {
                    let mut pending = Vec::new();
                    while let Ok(write) = write_rx.try_recv() {
                        pending.push(write);
                    }

                    let flushed = pending.len();
                    for chunk in pending.chunks(MAX_WRITE_BATCH) {
                        Self::flush(&client, chunk).await;
                    }

                    tracing::info!(flushed, "Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn flush(client: &Client, batch: &[CacheWrite]) {
        if let Err(e) = Self::write_pipeline(client, batch).await {
            tracing::warn!(error = %e, dropped = batch.len(), "Failed to write cache batch");
        }
    }

    async fn write_pipeline(client: &Client, batch: &[CacheWrite]) -> AppResult<()> {
        let mut pipe = redis::pipe();
        for write in batch {
            pipe.set_ex(&write.key, &write.value, write.ttl).ignore();
        }

        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// Reads several keys in one round trip
    ///
    /// The result is aligned with `keys`. Entries that are missing or no longer
    /// deserialize come back as `None`.
    pub async fn get_many<T: DeserializeOwned>(&self, keys: &[CacheKey]) -> AppResult<Vec<Option<T>>> {
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let names: Vec<String> = keys.iter().map(ToString::to_string).collect();
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let raw: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&names)
            .query_async(&mut conn)
            .await?;

        Ok(raw
            .into_iter()
            .zip(&names)
            .map(|(value, name)| {
                value.and_then(|json| match serde_json::from_str(&json) {
                    Ok(data) => Some(data),
                    Err(e) => {
                        tracing::warn!(key = %name, error = %e, "Discarding stale cache entry");
                        None
                    }
                })
            })
            .collect())
    }

    /// Queues a write without waiting for Redis
    pub fn set_in_background<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let value = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Cache serialization error");
                return;
            }
        };

        let write = CacheWrite {
            key: key.to_string(),
            value,
            ttl,
        };

        if self.write_tx.send(write).is_err() {
            tracing::warn!(key = %key, "Cache writer is gone, dropping write");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_cache_key_display_video() {
        let key = CacheKey::Video("dQw4w9WgXcQ".to_string());
        assert_eq!(key.to_string(), "video:dQw4w9WgXcQ");
    }

    #[tokio::test]
    async fn test_get_many_with_no_keys_skips_redis() {
        let client = Client::open("redis://127.0.0.1:1").unwrap();
        let (cache, handle) = Cache::new(client);

        let found: Vec<Option<String>> = cache.get_many(&[]).await.unwrap();
        assert!(found.is_empty());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_get_many_reports_unreachable_redis() {
        let client = Client::open("redis://127.0.0.1:1").unwrap();
        let (cache, handle) = Cache::new(client);

        let result: AppResult<Vec<Option<String>>> =
            cache.get_many(&[CacheKey::Video("a".to_string())]).await;
        assert!(matches!(result, Err(AppError::Cache(_))));
        handle.shutdown().await;
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_background_writes_are_read_back_in_order() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = create_redis_client(&redis_url).unwrap();
        let (cache, handle) = Cache::new(client.clone());

        let first = CacheKey::Video("cache_test_first".to_string());
        let missing = CacheKey::Video("cache_test_missing".to_string());
        let second = CacheKey::Video("cache_test_second".to_string());

        cache.set_in_background(&first, &"one".to_string(), 60);
        cache.set_in_background(&second, &"two".to_string(), 60);
        handle.shutdown().await;

        let found: Vec<Option<String>> = cache
            .get_many(&[first.clone(), missing, second.clone()])
            .await
            .unwrap();
        assert_eq!(
            found,
            vec![Some("one".to_string()), None, Some("two".to_string())]
        );

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = redis::cmd("DEL")
            .arg(first.to_string())
            .arg(second.to_string())
            .query_async(&mut conn)
            .await
            .unwrap();
    }
}
