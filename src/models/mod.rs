use serde::{Deserialize, Serialize};

pub mod interaction;
pub mod session;
pub mod user;
pub mod video;

pub use interaction::{InteractionEvent, InteractionFilter, InteractionPayload, InteractionType};
pub use session::{
    AccuracyBreakdown, DailySummary, SessionData, SessionFilter, SessionId, SessionPhase,
    SessionRecord, SessionStats, SessionSummary,
};
pub use user::{UserPreferences, UserRecord};
pub use video::{RecommendationResult, SourceCounts, Video, VideoRow, FALLBACK_THUMBNAIL_URL};

// ============================================================================
// Recommendation API Types
// ============================================================================

/// Body of `POST /api/recommendations`
#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SourceInfo {
    pub from_microservice: usize,
    pub from_catalog: usize,
    pub from_fallback: usize,
}

/// Response of `POST /api/recommendations`
#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: String,
    pub videos: Vec<Video>,
    pub count: usize,
    pub recommended_count: usize,
    pub additional_count: usize,
    pub source_info: SourceInfo,
}

impl From<RecommendationResult> for RecommendationResponse {
    fn from(result: RecommendationResult) -> Self {
        let additional_count = result.filler_count();
        Self {
            count: result.videos.len(),
            recommended_count: result.recommended_count,
            additional_count,
            source_info: SourceInfo {
                from_microservice: result.source_counts.from_service,
                from_catalog: result.source_counts.from_catalog_random,
                from_fallback: result.source_counts.from_fallback,
            },
            user_id: result.user_id,
            videos: result.videos,
        }
    }
}

/// Response from the recommendation microservice's workflow endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowResponse {
    pub video_ids: Vec<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub total_count: Option<usize>,
}

// ============================================================================
// Analytics API Types
// ============================================================================

/// Body of `POST /api/analytics`
#[derive(Debug, Deserialize)]
pub struct AnalyticsRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub interactions: Vec<InteractionPayload>,
    #[serde(default)]
    pub session_data: Option<SessionData>,
}

/// Outcome of one table write during ingest
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestResult {
    Interactions {
        count: usize,
        table: &'static str,
    },
    Session {
        table: &'static str,
        session_id: String,
        metrics: AccuracyBreakdown,
    },
}

#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub total_interactions: usize,
    pub tables_updated: usize,
}

/// Response of `POST /api/analytics`
#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub message: String,
    pub results: Vec<IngestResult>,
    pub summary: IngestSummary,
}

/// Record counts reported by the analytics status endpoint
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct StoreCounts {
    pub video_interactions: usize,
    pub recommendation_sessions: usize,
}
