use axum::extract::State;
use axum::Json;
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::taste_profile::TasteProfile;
use crate::models::user::AuthenticatedUser;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UserStatsResponse {
    pub plays_last_30_days: i64,
    pub active_downloads: i64,
    pub wishlist_size: usize,
    pub taste_profile: Option<TasteProfile>,
}

pub async fn me_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserStatsResponse>> {
    let since = Utc::now() - Duration::days(30);

    let plays_last_30_days =
        state.entities.listening_events.count_since(user.user.id, since).await?;
    let wishlist_size = state.entities.wishlist.list_for_user(user.user.id).await?.len();
    let active_downloads = state.entities.downloads.count_active().await?;
    let taste_profile = state.entities.taste_profiles.latest(user.user.id).await?;

    Ok(Json(UserStatsResponse {
        plays_last_30_days,
        active_downloads,
        wishlist_size,
        taste_profile,
    }))
}
