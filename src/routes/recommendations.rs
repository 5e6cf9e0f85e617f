use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{RecommendationRequest, RecommendationResponse},
    routes::AppState,
};

/// Handler for the recommendations endpoint
///
/// Always answers with a full screen of videos as long as any tier has
/// content; upstream failures only shrink the recommended share.
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let user_id = request
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("user_id is required".to_string()))?;

    let top_k = resolve_top_k(request.top_k, state.recommended_target, state.target_total);

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        top_k,
        "Assembling recommendations"
    );

    let result = state
        .assembler
        .assemble(&user_id, state.target_total, top_k)
        .await;

    tracing::info!(
        request_id = %request_id,
        count = result.videos.len(),
        recommended = result.recommended_count,
        "Recommendations assembled"
    );

    Ok(Json(result.into()))
}

/// Missing or zero falls back to the configured default; never above the screen size
fn resolve_top_k(requested: Option<usize>, default: usize, target_total: usize) -> usize {
    match requested {
        Some(k) if k > 0 => k,
        _ => default,
    }
    .min(target_total)
}
