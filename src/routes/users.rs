use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{UserPreferences, UserRecord},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
}

/// Creates the user unless it already exists; 201 when created, 200 otherwise
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserRecord>)> {
    if request.user_id.trim().is_empty() {
        return Err(AppError::InvalidInput("user_id is required".to_string()));
    }

    let user = UserRecord::new(request.user_id, request.email, request.preferences);
    let (user, created) = state.users.create_user_if_missing(user).await?;

    if created {
        tracing::info!(user_id = %user.user_id, "User created");
    }

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(user)))
}

pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserPreferences>> {
    let user = state
        .users
        .get_user(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    Ok(Json(user.preferences))
}

pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(preferences): Json<UserPreferences>,
) -> AppResult<Json<UserPreferences>> {
    let user = state
        .users
        .update_preferences(&user_id, &preferences)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    Ok(Json(user.preferences))
}
