use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::recommendation::{Recommendation, RecommendationCategory};
use crate::models::user::AuthenticatedUser;
use crate::services::recommendation;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<RecommendationCategory>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn list_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Recommendation>>> {
    let recs = state
        .entities
        .recommendations
        .active_for_user(user.user.id, query.category, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(recs))
}

pub async fn dismiss_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<Json<Recommendation>> {
    state.entities.recommendations.dismiss(id).await?;
    Ok(Json(state.entities.recommendations.get(id).await?))
}

pub async fn mark_clicked_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<Json<Recommendation>> {
    state.entities.recommendations.mark_clicked(id).await?;
    Ok(Json(state.entities.recommendations.get(id).await?))
}

#[derive(Debug, Serialize)]
pub struct GenerationQueuedResponse {
    pub status: &'static str,
}

/// Runs daily-recommendation generation inline; touches only the caller's
/// own taste data so it's fast enough not to need backgrounding.
pub async fn generate_daily_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<GenerationQueuedResponse>> {
    recommendation::generate_daily(&state.entities, &state.integrations, &state.settings, &user.user)
        .await?;
    Ok(Json(GenerationQueuedResponse { status: "completed" }))
}

pub async fn generate_discover_weekly_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<GenerationQueuedResponse>> {
    recommendation::generate_discover_weekly(
        &state.entities,
        &state.integrations,
        &state.settings,
        &user.user,
    )
    .await?;
    Ok(Json(GenerationQueuedResponse { status: "completed" }))
}

/// Taste-profile recomputation can scan a user's full listening history, so
/// it's backgrounded and reports `queued` immediately.
pub async fn update_taste_profile_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<GenerationQueuedResponse>> {
    let entities = state.entities.clone();
    let settings = state.settings.clone();
    let target = user.user.clone();
    tokio::spawn(async move {
        if let Err(e) = recommendation::update_taste_profile(&entities, &settings, &target).await {
            tracing::warn!(user_id = %target.id, error = %e, "taste profile update failed");
        }
    });
    Ok(Json(GenerationQueuedResponse { status: "queued" }))
}
