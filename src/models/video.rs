use serde::{Deserialize, Serialize};

/// Thumbnail used whenever a catalog row has none
pub const FALLBACK_THUMBNAIL_URL: &str = "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg";

/// Video as shown to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub description: String,
}

impl Video {
    /// Deterministic stand-in for a recommended id the catalog does not know
    pub fn placeholder(video_id: &str) -> Self {
        Self {
            id: video_id.to_string(),
            title: format!("Recommended Video {}", video_id),
            thumbnail: FALLBACK_THUMBNAIL_URL.to_string(),
            description: format!("Recommended video content for {}", video_id),
        }
    }
}

/// Row of the `videos` catalog table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct VideoRow {
    pub video_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        let title = row
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Video {}", row.video_id));

        let thumbnail = row
            .thumbnail_url
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_THUMBNAIL_URL.to_string());

        // Rows without a description reuse the title
        let description = row
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| title.clone());

        Video {
            id: row.video_id,
            title,
            thumbnail,
            description,
        }
    }
}

/// Where the entries of a recommendation list came from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceCounts {
    pub from_service: usize,
    pub from_catalog_random: usize,
    pub from_fallback: usize,
}

/// Fixed-size, deduplicated list of videos for one user
///
/// The first `recommended_count` entries came from the recommendation service;
/// everything after them is filler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResult {
    pub user_id: String,
    pub videos: Vec<Video>,
    pub recommended_count: usize,
    pub source_counts: SourceCounts,
}

impl RecommendationResult {
    /// Ids of the entries that count as recommended for accuracy scoring
    pub fn recommended_ids(&self) -> Vec<String> {
        self.videos
            .iter()
            .take(self.recommended_count)
            .map(|v| v.id.clone())
            .collect()
    }

    pub fn filler_count(&self) -> usize {
        self.videos.len().saturating_sub(self.recommended_count)
    }
}
