//! Privacy-gated taste sharing. Grounded on the user model's own
//! `share_listening_activity`/`share_taste_profile` toggles and cached
//! cluster/tag fields — there's no separate "friends" graph, just opt-in
//! visibility of one's own computed taste data to other users.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::user::AuthenticatedUser;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SharedProfile {
    pub username: String,
    pub taste_cluster: Option<String>,
    pub tags: Vec<String>,
}

/// Other users who currently share their taste profile. Listening activity
/// sharing is a separate, narrower toggle not exposed through this feed.
pub async fn shared_profiles_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<SharedProfile>>> {
    let users = state.entities.users.list_active().await?;
    let shared = users
        .into_iter()
        .filter(|u| u.share_taste_profile)
        .map(|u| SharedProfile {
            username: u.username,
            taste_cluster: u.cached_taste_cluster,
            tags: u.cached_tags,
        })
        .collect();
    Ok(Json(shared))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrivacySettingsRequest {
    pub share_listening_activity: bool,
    pub share_taste_profile: bool,
}

pub async fn update_privacy_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<PrivacySettingsRequest>,
) -> Result<Json<PrivacySettingsRequest>> {
    state
        .entities
        .users
        .set_privacy(user.user.id, request.share_listening_activity, request.share_taste_profile)
        .await?;
    Ok(Json(request))
}
