use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{InteractionEvent, InteractionType, SessionId, SessionStats},
    routes::AppState,
    services::{analytics, SummaryReport},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: SessionId,
}

#[derive(Debug, Deserialize)]
pub struct SetRecommendedRequest {
    pub video_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub user_id: String,
    pub video_id: String,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub current_selection: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub user_id: String,
    #[serde(default)]
    pub selected_video_ids: Vec<String>,
}

/// Starts a new aggregator session
pub async fn start(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SessionCreated>) {
    let session_id = state.sessions.start().await;
    (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AppResult<Json<SessionStats>> {
    let ctx = state.sessions.get(&session_id).await?;
    let stats = ctx.lock().await.stats();
    Ok(Json(stats))
}

pub async fn set_recommended(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<SetRecommendedRequest>,
) -> AppResult<Json<SessionStats>> {
    let ctx = state.sessions.get(&session_id).await?;
    let mut ctx = ctx.lock().await;
    ctx.set_recommended(request.video_ids);
    Ok(Json(ctx.stats()))
}

pub async fn track(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(session_id): Path<String>,
    Json(request): Json<TrackRequest>,
) -> AppResult<(StatusCode, Json<InteractionEvent>)> {
    if request.user_id.trim().is_empty() || request.video_id.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "user_id and video_id are required".to_string(),
        ));
    }

    let ctx = state.sessions.get(&session_id).await?;
    let event = analytics::track(
        &mut *ctx.lock().await,
        &state.sink,
        &request.user_id,
        &request.video_id,
        request.interaction_type,
        &request.current_selection,
    );

    tracing::debug!(
        request_id = %request_id,
        session_id = %session_id,
        is_recommended = event.is_recommended,
        "Interaction accepted"
    );

    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn summarize(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(session_id): Path<String>,
    Json(request): Json<SummaryRequest>,
) -> AppResult<Json<SummaryReport>> {
    if request.user_id.trim().is_empty() {
        return Err(AppError::InvalidInput("user_id is required".to_string()));
    }

    let ctx = state.sessions.get(&session_id).await?;
    let report = analytics::summarize(
        &mut *ctx.lock().await,
        state.store.as_ref(),
        &request.user_id,
        &request.selected_video_ids,
    )
    .await;

    tracing::info!(
        request_id = %request_id,
        session_id = %session_id,
        persisted = report.persisted,
        "Session summarized"
    );

    Ok(Json(report))
}

pub async fn reset(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AppResult<Json<SessionCreated>> {
    let session_id = state.sessions.reset(&session_id).await?;
    Ok(Json(SessionCreated { session_id }))
}

/// Ends a session and frees its state
pub async fn end(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AppResult<StatusCode> {
    state.sessions.end(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
