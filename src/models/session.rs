use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    fmt::Display,
};
use uuid::Uuid;

/// Identifier of one recommendation cycle, e.g. `session_1718000000000_3f9a1c2b7`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generates a fresh, unique session id
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "session_{}_{}",
            Utc::now().timestamp_millis(),
            &suffix[..9]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Overlap between the recommended and the selected videos of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccuracyBreakdown {
    pub total_recommended: usize,
    pub selected_recommended: usize,
    pub accuracy_percent: f64,
}

impl AccuracyBreakdown {
    /// `100 * |selected ∩ recommended| / |recommended|`, 0 when nothing was recommended.
    /// Both sides are treated as sets.
    pub fn compute(recommended: &[String], selected: &[String]) -> Self {
        let recommended: HashSet<&str> = recommended.iter().map(String::as_str).collect();
        let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();

        let selected_recommended = selected.intersection(&recommended).count();
        let accuracy_percent = if recommended.is_empty() {
            0.0
        } else {
            100.0 * selected_recommended as f64 / recommended.len() as f64
        };

        Self {
            total_recommended: recommended.len(),
            selected_recommended,
            accuracy_percent,
        }
    }
}

/// End-of-session summary derived from the recommended and selected sets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub user_id: String,
    pub session_id: SessionId,
    pub recommended_video_ids: Vec<String>,
    pub selected_video_ids: Vec<String>,
    pub accuracy_percent: f64,
}

/// Lifecycle of a session context
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Empty,
    Recommended,
    Summarized,
}

/// Snapshot of a session's in-memory state
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionStats {
    pub session_id: SessionId,
    pub phase: SessionPhase,
    pub total_interactions: usize,
    pub recommended_videos: Vec<String>,
    pub interactions_by_type: BTreeMap<String, usize>,
}

/// Session part of an analytics ingest request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionData {
    pub recommended_videos: Vec<String>,
    pub selected_videos: Vec<String>,
    /// Client-computed accuracy. Ignored in favour of the server's own figure.
    #[serde(default)]
    pub recommendation_accuracy: Option<f64>,
}

/// Persisted session row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub user_id: String,
    pub session_id: String,
    pub recommended_videos: Vec<String>,
    pub selected_videos: Vec<String>,
    pub total_recommended: i32,
    pub selected_recommended: i32,
    pub recommendation_accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(
        user_id: &str,
        session_id: &str,
        recommended_videos: Vec<String>,
        selected_videos: Vec<String>,
    ) -> Self {
        let breakdown = AccuracyBreakdown::compute(&recommended_videos, &selected_videos);
        Self {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            recommended_videos,
            selected_videos,
            total_recommended: breakdown.total_recommended as i32,
            selected_recommended: breakdown.selected_recommended as i32,
            recommendation_accuracy: breakdown.accuracy_percent,
            timestamp: Utc::now(),
        }
    }
}

impl From<&SessionSummary> for SessionRecord {
    fn from(summary: &SessionSummary) -> Self {
        SessionRecord::new(
            &summary.user_id,
            summary.session_id.as_str(),
            summary.recommended_video_ids.clone(),
            summary.selected_video_ids.clone(),
        )
    }
}

/// Read-back filter for stored sessions
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub user_id: Option<String>,
    pub limit: Option<usize>,
}

/// Per-user, per-day rollup of stored sessions
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailySummary {
    pub user_id: String,
    pub date: NaiveDate,
    pub sessions: usize,
    pub total_recommended: i64,
    pub selected_recommended: i64,
    pub average_accuracy: f64,
}
