use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, HashSet};

use crate::{
    db::{AnalyticsStore, InteractionSink, INTERACTIONS_TABLE, SESSIONS_TABLE},
    error::{AppError, AppResult},
    models::{
        AccuracyBreakdown, AnalyticsRequest, DailySummary, IngestReport, IngestResult,
        IngestSummary, InteractionEvent, InteractionType, SessionId, SessionPhase, SessionRecord,
        SessionStats, SessionSummary,
    },
};

/// State of one recommendation cycle
///
/// Owned by whoever drives the cycle and passed to every operation; nothing
/// here is process-wide.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: SessionId,
    recommended: Vec<String>,
    recommended_set: HashSet<String>,
    events: Vec<InteractionEvent>,
    phase: SessionPhase,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            session_id: SessionId::generate(),
            recommended: Vec::new(),
            recommended_set: HashSet::new(),
            events: Vec::new(),
            phase: SessionPhase::Empty,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn recommended(&self) -> &[String] {
        &self.recommended
    }

    pub fn events(&self) -> &[InteractionEvent] {
        &self.events
    }

    /// Sets the ground-truth recommended ids for this cycle. Repeated ids are kept once.
    pub fn set_recommended(&mut self, video_ids: Vec<String>) {
        let mut seen = HashSet::new();
        self.recommended = video_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        self.recommended_set = seen;
        self.phase = SessionPhase::Recommended;

        tracing::debug!(
            session_id = %self.session_id,
            recommended = self.recommended.len(),
            "Recommended videos set"
        );
    }

    /// Appends an event to the log and returns it
    ///
    /// Events recorded before `set_recommended` are never recommended and are
    /// not corrected later.
    pub fn record(
        &mut self,
        user_id: &str,
        video_id: &str,
        interaction_type: InteractionType,
        current_selection: &[String],
    ) -> InteractionEvent {
        if self.phase == SessionPhase::Empty {
            tracing::warn!(
                session_id = %self.session_id,
                video_id = %video_id,
                "Interaction tracked before recommended videos were set"
            );
        }

        let event = InteractionEvent {
            user_id: user_id.to_string(),
            video_id: video_id.to_string(),
            interaction_type,
            is_recommended: self.recommended_set.contains(video_id),
            session_id: self.session_id.0.clone(),
            timestamp: Utc::now(),
        };

        tracing::debug!(
            session_id = %self.session_id,
            video_id = %video_id,
            interaction_type = %interaction_type,
            is_recommended = event.is_recommended,
            selected = current_selection.len(),
            "Interaction tracked"
        );

        self.events.push(event.clone());
        event
    }

    /// Computes the session summary without touching the log
    pub fn summary(&self, user_id: &str, selected_video_ids: &[String]) -> SessionSummary {
        let mut seen = HashSet::new();
        let selected: Vec<String> = selected_video_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let breakdown = AccuracyBreakdown::compute(&self.recommended, &selected);

        SessionSummary {
            user_id: user_id.to_string(),
            session_id: self.session_id.clone(),
            recommended_video_ids: self.recommended.clone(),
            selected_video_ids: selected,
            accuracy_percent: breakdown.accuracy_percent,
        }
    }

    /// Starts a new cycle: new id, empty log, no recommended set
    pub fn reset(&mut self) {
        let previous = std::mem::replace(&mut self.session_id, SessionId::generate());
        self.recommended.clear();
        self.recommended_set.clear();
        self.events.clear();
        self.phase = SessionPhase::Empty;

        tracing::info!(
            previous = %previous,
            session_id = %self.session_id,
            "Session reset"
        );
    }

    pub fn stats(&self) -> SessionStats {
        let mut interactions_by_type = BTreeMap::new();
        for event in &self.events {
            *interactions_by_type
                .entry(event.interaction_type.to_string())
                .or_insert(0) += 1;
        }

        SessionStats {
            session_id: self.session_id.clone(),
            phase: self.phase,
            total_interactions: self.events.len(),
            recommended_videos: self.recommended.clone(),
            interactions_by_type,
        }
    }
}

/// Records an interaction and hands it to the background writer
pub fn track(
    ctx: &mut SessionContext,
    sink: &InteractionSink,
    user_id: &str,
    video_id: &str,
    interaction_type: InteractionType,
    current_selection: &[String],
) -> InteractionEvent {
    let event = ctx.record(user_id, video_id, interaction_type, current_selection);
    sink.submit(vec![event.clone()]);
    event
}

/// Summary plus whether the batch reached the store
#[derive(Debug, Clone, serde::Serialize)]
pub struct SummaryReport {
    pub summary: SessionSummary,
    pub persisted: bool,
}

/// Computes the session summary and stores it with the event log
///
/// The log is cleared only when the batch write succeeds, so a retry after a
/// failure resends the same events. A failed write never fails the summary.
pub async fn summarize(
    ctx: &mut SessionContext,
    store: &dyn AnalyticsStore,
    user_id: &str,
    selected_video_ids: &[String],
) -> SummaryReport {
    let summary = ctx.summary(user_id, selected_video_ids);
    let record = SessionRecord::from(&summary);

    tracing::info!(
        session_id = %summary.session_id,
        user_id = %user_id,
        recommended = summary.recommended_video_ids.len(),
        selected = summary.selected_video_ids.len(),
        accuracy = summary.accuracy_percent,
        "Sending session summary"
    );

    let persisted = match store.record_session_batch(ctx.events(), &record).await {
        Ok(()) => {
            ctx.events.clear();
            true
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                session_id = %summary.session_id,
                store = store.name(),
                "Failed to persist session summary"
            );
            false
        }
    };

    ctx.phase = SessionPhase::Summarized;
    SummaryReport { summary, persisted }
}

/// Stores a client-submitted analytics batch
///
/// Accuracy and totals are always recomputed from the submitted sets.
pub async fn ingest(store: &dyn AnalyticsStore, request: AnalyticsRequest) -> AppResult<IngestReport> {
    let user_id = request
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("user_id is required".to_string()))?;

    let session_id = request
        .interactions
        .first()
        .and_then(|i| i.session_id.clone())
        .unwrap_or_else(|| SessionId::generate().0);

    let events: Vec<InteractionEvent> = request
        .interactions
        .into_iter()
        .map(|i| i.into_event(&session_id))
        .collect();

    let mut results = Vec::new();

    match request.session_data {
        Some(data) => {
            if let Some(client_accuracy) = data.recommendation_accuracy {
                tracing::debug!(client_accuracy, "Ignoring client-computed accuracy");
            }

            let record = SessionRecord::new(
                &user_id,
                &session_id,
                data.recommended_videos,
                data.selected_videos,
            );
            store.record_session_batch(&events, &record).await?;

            if !events.is_empty() {
                results.push(IngestResult::Interactions {
                    count: events.len(),
                    table: INTERACTIONS_TABLE,
                });
            }
            results.push(IngestResult::Session {
                table: SESSIONS_TABLE,
                session_id: record.session_id.clone(),
                metrics: AccuracyBreakdown {
                    total_recommended: record.total_recommended as usize,
                    selected_recommended: record.selected_recommended as usize,
                    accuracy_percent: record.recommendation_accuracy,
                },
            });
        }
        None if !events.is_empty() => {
            let count = store.record_interactions(&events).await?;
            results.push(IngestResult::Interactions {
                count,
                table: INTERACTIONS_TABLE,
            });
        }
        None => {}
    }

    tracing::info!(
        user_id = %user_id,
        interactions = events.len(),
        tables_updated = results.len(),
        store = store.name(),
        "Analytics batch stored"
    );

    Ok(IngestReport {
        success: true,
        message: format!("Analytics data saved to {} store", store.name()),
        summary: IngestSummary {
            total_interactions: events.len(),
            tables_updated: results.len(),
        },
        results,
    })
}

/// Rolls stored sessions up per user and calendar day (UTC), newest day first
pub fn daily_summary(sessions: &[SessionRecord]) -> Vec<DailySummary> {
    let mut groups: BTreeMap<(String, NaiveDate), Vec<&SessionRecord>> = BTreeMap::new();
    for session in sessions {
        groups
            .entry((session.user_id.clone(), session.timestamp.date_naive()))
            .or_default()
            .push(session);
    }

    let mut summaries: Vec<DailySummary> = groups
        .into_iter()
        .map(|((user_id, date), rows)| {
            let accuracy_sum: f64 = rows.iter().map(|r| r.recommendation_accuracy).sum();
            DailySummary {
                user_id,
                date,
                sessions: rows.len(),
                total_recommended: rows.iter().map(|r| r.total_recommended as i64).sum(),
                selected_recommended: rows.iter().map(|r| r.selected_recommended as i64).sum(),
                average_accuracy: accuracy_sum / rows.len() as f64,
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.user_id.cmp(&b.user_id)));
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FileStore, MockAnalyticsStore};
    use crate::models::{InteractionFilter, SessionFilter};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn failing_store() -> MockAnalyticsStore {
        let mut store = MockAnalyticsStore::new();
        store
            .expect_record_session_batch()
            .returning(|_, _| Err(AppError::Persistence("connection reset".to_string())));
        store.expect_name().return_const("mock");
        store
    }

    #[test]
    fn test_is_recommended_follows_recommended_set() {
        let mut ctx = SessionContext::new();
        ctx.set_recommended(ids(&["A", "B"]));

        let hit = ctx.record("u1", "A", InteractionType::Click, &[]);
        let miss = ctx.record("u1", "Z", InteractionType::Click, &[]);

        assert!(hit.is_recommended);
        assert!(!miss.is_recommended);
        assert_eq!(hit.session_id, ctx.session_id().0);
    }

    #[test]
    fn test_track_before_set_recommended_is_not_corrected() {
        let mut ctx = SessionContext::new();
        let early = ctx.record("u1", "A", InteractionType::View, &[]);
        ctx.set_recommended(ids(&["A"]));

        assert!(!early.is_recommended);
        assert!(!ctx.events()[0].is_recommended);
        assert!(ctx.record("u1", "A", InteractionType::View, &[]).is_recommended);
    }

    #[test]
    fn test_summary_accuracy() {
        let mut ctx = SessionContext::new();
        ctx.set_recommended(ids(&["A", "B", "C", "D"]));

        let summary = ctx.summary("u1", &ids(&["A", "C", "Z"]));
        assert_eq!(summary.accuracy_percent, 50.0);
        assert_eq!(summary.selected_video_ids, ids(&["A", "C", "Z"]));
    }

    #[test]
    fn test_summary_without_recommendations_is_zero() {
        let ctx = SessionContext::new();
        let summary = ctx.summary("u1", &ids(&["A"]));
        assert_eq!(summary.accuracy_percent, 0.0);
    }

    #[test]
    fn test_reset_starts_new_session() {
        let mut ctx = SessionContext::new();
        ctx.set_recommended(ids(&["A"]));
        ctx.record("u1", "A", InteractionType::Select, &ids(&["A"]));
        let old_id = ctx.session_id().clone();

        ctx.reset();
        assert_ne!(ctx.session_id(), &old_id);
        assert!(ctx.events().is_empty());
        assert!(ctx.recommended().is_empty());
        assert_eq!(ctx.phase(), SessionPhase::Empty);

        ctx.set_recommended(ids(&["B"]));
        let event = ctx.record("u1", "A", InteractionType::Select, &[]);
        assert_ne!(event.session_id, old_id.0);
        assert!(!event.is_recommended);
        assert_eq!(ctx.events().len(), 1);
    }

    #[test]
    fn test_stats_counts_by_type() {
        let mut ctx = SessionContext::new();
        ctx.set_recommended(ids(&["A"]));
        ctx.record("u1", "A", InteractionType::View, &[]);
        ctx.record("u1", "A", InteractionType::Select, &[]);
        ctx.record("u1", "B", InteractionType::View, &[]);

        let stats = ctx.stats();
        assert_eq!(stats.total_interactions, 3);
        assert_eq!(stats.interactions_by_type["view"], 2);
        assert_eq!(stats.interactions_by_type["select"], 1);
        assert_eq!(stats.phase, SessionPhase::Recommended);
    }

    #[tokio::test]
    async fn test_track_submits_to_sink() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let (sink, handle) = InteractionSink::new(store.clone());

        let mut ctx = SessionContext::new();
        ctx.set_recommended(ids(&["A"]));
        let event = track(&mut ctx, &sink, "u1", "A", InteractionType::Select, &ids(&["A"]));
        handle.shutdown().await;

        let stored = store
            .list_interactions(&InteractionFilter::default())
            .await
            .unwrap();
        assert_eq!(stored, vec![event]);
    }

    #[tokio::test]
    async fn test_summarize_persists_and_clears_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let mut ctx = SessionContext::new();
        ctx.set_recommended(ids(&["A", "B"]));
        ctx.record("u1", "A", InteractionType::Select, &ids(&["A"]));

        let report = summarize(&mut ctx, &store, "u1", &ids(&["A"])).await;
        assert!(report.persisted);
        assert_eq!(report.summary.accuracy_percent, 50.0);
        assert!(ctx.events().is_empty());
        assert_eq!(ctx.phase(), SessionPhase::Summarized);

        let sessions = store.list_sessions(&SessionFilter::default()).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].selected_recommended, 1);
        assert_eq!(store.counts().await.unwrap().video_interactions, 1);
    }

    #[tokio::test]
    async fn test_summarize_failure_keeps_log_and_is_idempotent() {
        let store = failing_store();

        let mut ctx = SessionContext::new();
        ctx.set_recommended(ids(&["A", "B", "C", "D"]));
        ctx.record("u1", "A", InteractionType::Select, &[]);

        let first = summarize(&mut ctx, &store, "u1", &ids(&["A", "C", "Z"])).await;
        let second = summarize(&mut ctx, &store, "u1", &ids(&["A", "C", "Z"])).await;

        assert!(!first.persisted);
        assert_eq!(ctx.events().len(), 1);
        assert_eq!(first.summary, second.summary);
        assert_eq!(second.summary.accuracy_percent, 50.0);
    }

    #[tokio::test]
    async fn test_ingest_requires_user_id() {
        let store = MockAnalyticsStore::new();
        let request: AnalyticsRequest = serde_json::from_str(r#"{"interactions":[]}"#).unwrap();

        let result = ingest(&store, request).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_ingest_interactions_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let request: AnalyticsRequest = serde_json::from_str(
            r#"{"user_id":"u1","interactions":[
                {"user_id":"u1","video_id":"v1","interaction_type":"view","is_recommended":true,"session_id":"s9"},
                {"user_id":"u1","video_id":"v2","interaction_type":"click"}
            ]}"#,
        )
        .unwrap();

        let report = ingest(&store, request).await.unwrap();
        assert_eq!(report.summary.total_interactions, 2);
        assert_eq!(report.summary.tables_updated, 1);

        // The second event inherits the batch's session id
        let filter = InteractionFilter {
            session_id: Some("s9".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list_interactions(&filter).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_session_recomputes_accuracy() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let request: AnalyticsRequest = serde_json::from_str(
            r#"{"user_id":"u1","interactions":[],
                "session_data":{"recommended_videos":["A","B","C","D"],
                                "selected_videos":["A","C","Z"],
                                "recommendation_accuracy":99.0}}"#,
        )
        .unwrap();

        let report = ingest(&store, request).await.unwrap();
        assert_eq!(report.summary.tables_updated, 1);
        match &report.results[0] {
            IngestResult::Session { metrics, .. } => {
                assert_eq!(metrics.accuracy_percent, 50.0);
                assert_eq!(metrics.selected_recommended, 2);
            }
            other => panic!("unexpected result {:?}", other),
        }

        let sessions = store.list_sessions(&SessionFilter::default()).await.unwrap();
        assert_eq!(sessions[0].recommendation_accuracy, 50.0);
        assert!(sessions[0].session_id.starts_with("session_"));
    }

    #[test]
    fn test_daily_summary_groups_by_user_and_day() {
        let day1 = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let day2 = day1 + Duration::days(1);

        let mut a = SessionRecord::new("u1", "s1", ids(&["A", "B"]), ids(&["A"]));
        a.timestamp = day1;
        let mut b = SessionRecord::new("u1", "s2", ids(&["A", "B"]), ids(&["A", "B"]));
        b.timestamp = day1 + Duration::hours(2);
        let mut c = SessionRecord::new("u1", "s3", ids(&["A"]), ids(&[]));
        c.timestamp = day2;

        let summary = daily_summary(&[a, b, c]);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].date, day2.date_naive());
        assert_eq!(summary[1].sessions, 2);
        assert_eq!(summary[1].average_accuracy, 75.0);
        assert_eq!(summary[1].selected_recommended, 3);
    }
}
