use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::{
    db::{INTERACTIONS_TABLE, SESSIONS_TABLE},
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{AnalyticsRequest, IngestReport, InteractionFilter, SessionFilter},
    routes::AppState,
    services::{
        analytics,
        export::{self, ExportFile},
    },
};

const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsView {
    Interactions,
    Sessions,
    Summary,
    Download,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(rename = "type")]
    pub view: Option<AnalyticsView>,
    pub file: Option<ExportFile>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct DataResponse<T> {
    success: bool,
    count: usize,
    data: Vec<T>,
}

impl<T: Serialize> DataResponse<T> {
    fn new(data: Vec<T>) -> Json<Self> {
        Json(Self {
            success: true,
            count: data.len(),
            data,
        })
    }
}

/// Handler for analytics ingest
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<AnalyticsRequest>,
) -> AppResult<Json<IngestReport>> {
    tracing::debug!(
        request_id = %request_id,
        interactions = request.interactions.len(),
        has_session = request.session_data.is_some(),
        "Analytics batch received"
    );

    let report = analytics::ingest(state.store.as_ref(), request).await?;
    Ok(Json(report))
}

/// Handler for analytics read-back, summaries, CSV download and status
pub async fn read(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Response> {
    let limit = Some(query.limit.unwrap_or(DEFAULT_LIMIT));

    tracing::debug!(request_id = %request_id, view = ?query.view, "Analytics read");

    let response = match query.view {
        Some(AnalyticsView::Interactions) => {
            let filter = InteractionFilter {
                user_id: query.user_id,
                session_id: query.session_id,
                limit,
            };
            DataResponse::new(state.store.list_interactions(&filter).await?).into_response()
        }
        Some(AnalyticsView::Sessions) => {
            let filter = SessionFilter {
                user_id: query.user_id,
                limit,
            };
            DataResponse::new(state.store.list_sessions(&filter).await?).into_response()
        }
        Some(AnalyticsView::Summary) => {
            let filter = SessionFilter {
                user_id: query.user_id,
                limit: None,
            };
            let sessions = state.store.list_sessions(&filter).await?;
            let mut summary = analytics::daily_summary(&sessions);
            summary.truncate(limit.unwrap_or(DEFAULT_LIMIT));
            DataResponse::new(summary).into_response()
        }
        Some(AnalyticsView::Download) => {
            let file = query.file.unwrap_or(ExportFile::Interactions);
            download(&state, file, query.user_id).await?
        }
        None => {
            let counts = state.store.counts().await?;
            Json(json!({
                "success": true,
                "message": format!("Analytics system active ({} store)", state.store.name()),
                "tables": {
                    INTERACTIONS_TABLE: { "total_records": counts.video_interactions },
                    SESSIONS_TABLE: { "total_records": counts.recommendation_sessions },
                },
            }))
            .into_response()
        }
    };

    Ok(response)
}

/// Full history as a CSV attachment, unlimited
async fn download(state: &AppState, file: ExportFile, user_id: Option<String>) -> AppResult<Response> {
    let csv = match file {
        ExportFile::Interactions => {
            let filter = InteractionFilter {
                user_id,
                ..Default::default()
            };
            export::to_csv(&state.store.list_interactions(&filter).await?)?
        }
        ExportFile::Sessions => {
            let filter = SessionFilter {
                user_id,
                limit: None,
            };
            export::to_csv(&state.store.list_sessions(&filter).await?)?
        }
    };

    let csv = csv.ok_or_else(|| AppError::NotFound("No data found".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename()),
            ),
        ],
        csv,
    )
        .into_response())
}
