use rand::seq::SliceRandom;
use std::{collections::HashSet, path::Path};

use crate::{
    error::AppResult,
    models::{Video, VideoRow},
    services::catalog::VideoCatalog,
};

/// In-memory catalog, optionally loaded from a JSON file of catalog rows
#[derive(Debug, Clone, Default)]
pub struct StaticVideoCatalog {
    videos: Vec<Video>,
}

impl StaticVideoCatalog {
    /// Builds a catalog from videos, keeping the first entry of a repeated id
    pub fn new(videos: Vec<Video>) -> Self {
        let mut seen = HashSet::new();
        let videos = videos
            .into_iter()
            .filter(|v| seen.insert(v.id.clone()))
            .collect();
        Self { videos }
    }

    /// Loads a JSON array of `{video_id, title, thumbnail_url, description}` rows
    pub async fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let rows: Vec<VideoRow> = serde_json::from_str(&raw)?;

        tracing::info!(
            path = %path.as_ref().display(),
            videos = rows.len(),
            "Loaded video catalog from file"
        );

        Ok(Self::new(rows.into_iter().map(Video::from).collect()))
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

#[async_trait::async_trait]
impl VideoCatalog for StaticVideoCatalog {
    async fn fetch_by_ids(&self, ids: &[String]) -> AppResult<Vec<Video>> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .videos
            .iter()
            .filter(|v| wanted.contains(v.id.as_str()))
            .cloned()
            .collect())
    }

    async fn sample_candidates(&self, limit: usize) -> AppResult<Vec<Video>> {
        let mut pool = self.videos.clone();
        pool.shuffle(&mut rand::thread_rng());
        pool.truncate(limit);
        Ok(pool)
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn catalog_of(ids: &[&str]) -> StaticVideoCatalog {
        StaticVideoCatalog::new(ids.iter().map(|id| Video::placeholder(id)).collect())
    }

    #[test]
    fn test_duplicate_ids_are_collapsed() {
        let catalog = catalog_of(&["a", "b", "a"]);
        assert_eq!(catalog.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_by_ids_skips_unknown() {
        let catalog = catalog_of(&["a", "b", "c"]);
        let found = catalog
            .fetch_by_ids(&["c".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "c");
    }

    #[tokio::test]
    async fn test_sample_candidates_respects_limit() {
        let catalog = catalog_of(&["a", "b", "c", "d", "e"]);
        let sample = catalog.sample_candidates(3).await.unwrap();
        assert_eq!(sample.len(), 3);

        let unique: HashSet<_> = sample.iter().map(|v| v.id.clone()).collect();
        assert_eq!(unique.len(), 3);
    }

    #[tokio::test]
    async fn test_sample_candidates_larger_than_catalog() {
        let catalog = catalog_of(&["a", "b"]);
        let sample = catalog.sample_candidates(10).await.unwrap();
        assert_eq!(sample.len(), 2);
    }

    #[tokio::test]
    async fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"video_id": "v1", "title": "Intro to RL", "thumbnail_url": "https://img/v1.jpg"}},
                {{"video_id": "v2"}}
            ]"#
        )
        .unwrap();

        let catalog = StaticVideoCatalog::from_json_file(file.path()).await.unwrap();
        assert_eq!(catalog.len(), 2);

        let found = catalog.fetch_by_ids(&["v2".to_string()]).await.unwrap();
        assert_eq!(found[0].title, "Video v2");
    }
}
