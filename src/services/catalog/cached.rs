use std::sync::Arc;

use crate::{
    db::{Cache, CacheKey},
    error::AppResult,
    models::Video,
    services::catalog::VideoCatalog,
};

const VIDEO_CACHE_TTL: u64 = 86400; // 1 day

/// Redis read-through decorator around another catalog
///
/// Only per-video metadata is cached. Random sampling always goes to the inner
/// catalog so every request draws a fresh pool. Redis being unavailable never
/// fails a lookup.
#[derive(Clone)]
pub struct CachedVideoCatalog {
    inner: Arc<dyn VideoCatalog>,
    cache: Cache,
}

impl CachedVideoCatalog {
    pub fn new(inner: Arc<dyn VideoCatalog>, cache: Cache) -> Self {
        Self { inner, cache }
    }

    /// Splits `ids` into cached videos and ids still to be fetched
    async fn lookup_cached(&self, ids: &[String]) -> (Vec<Video>, Vec<String>) {
        let keys: Vec<CacheKey> = ids.iter().cloned().map(CacheKey::Video).collect();

        match self.cache.get_many::<Video>(&keys).await {
            Ok(entries) => {
                let mut found = Vec::with_capacity(ids.len());
                let mut misses = Vec::new();
                for (id, entry) in ids.iter().zip(entries) {
                    match entry {
                        Some(video) => found.push(video),
                        None => misses.push(id.clone()),
                    }
                }
                (found, misses)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Catalog cache read failed, querying catalog");
                (vec![], ids.to_vec())
            }
        }
    }

    /// Fetches the misses from the inner catalog and merges them with the hits
    ///
    /// A failing inner catalog only fails the call when there is nothing
    /// cached to return.
    async fn fill_misses(&self, mut found: Vec<Video>, misses: Vec<String>) -> AppResult<Vec<Video>> {
        if misses.is_empty() {
            return Ok(found);
        }

        match self.inner.fetch_by_ids(&misses).await {
            Ok(fetched) => {
                for video in &fetched {
                    self.cache.set_in_background(
                        &CacheKey::Video(video.id.clone()),
                        video,
                        VIDEO_CACHE_TTL,
                    );
                }
                found.extend(fetched);
                Ok(found)
            }
            Err(e) if !found.is_empty() => {
                tracing::warn!(
                    error = %e,
                    hits = found.len(),
                    misses = misses.len(),
                    catalog = self.inner.name(),
                    "Catalog lookup failed, returning cached videos only"
                );
                Ok(found)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl VideoCatalog for CachedVideoCatalog {
    async fn fetch_by_ids(&self, ids: &[String]) -> AppResult<Vec<Video>> {
        let (found, misses) = self.lookup_cached(ids).await;
        tracing::debug!(hits = found.len(), misses = misses.len(), "Catalog cache lookup");
        self.fill_misses(found, misses).await
    }

    async fn sample_candidates(&self, limit: usize) -> AppResult<Vec<Video>> {
        self.inner.sample_candidates(limit).await
    }

    fn name(&self) -> &'static str {
        "cached"
    }
}
