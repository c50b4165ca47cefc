//! Settings are admin-only: they configure integrations and automation
//! thresholds shared by the whole instance, not per-user preferences.

use axum::extract::{Path, State};
use axum::Json;

use crate::error::{AppError, Result};
use crate::models::setting::{SettingEntry, UpdateSettingRequest};
use crate::models::user::AuthenticatedUser;
use crate::AppState;

fn require_admin(user: &AuthenticatedUser) -> Result<()> {
    if !user.user.is_admin {
        return Err(AppError::Forbidden { reason: "admin access required".to_string() });
    }
    Ok(())
}

pub async fn list_by_category_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<SettingEntry>>> {
    require_admin(&user)?;
    Ok(Json(state.settings.all_in_category(&category).await))
}

pub async fn get_handler(
    State(state): State<AppState>,
    Path((_category, key)): Path<(String, String)>,
    user: AuthenticatedUser,
) -> Result<Json<Option<String>>> {
    require_admin(&user)?;
    Ok(Json(state.settings.optional(&key).await))
}

pub async fn set_handler(
    State(state): State<AppState>,
    Path((category, key)): Path<(String, String)>,
    user: AuthenticatedUser,
    Json(request): Json<UpdateSettingRequest>,
) -> Result<Json<UpdateSettingRequest>> {
    require_admin(&user)?;
    state.settings.set(&key, &request.value, &category).await?;
    state.settings.publish_invalidation().await;
    Ok(Json(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{Claims, User};
    use chrono::Utc;
    use uuid::Uuid;

    fn user_with_admin(is_admin: bool) -> AuthenticatedUser {
        let now = Utc::now();
        AuthenticatedUser {
            user: User {
                id: Uuid::new_v4(),
                username: "test".to_string(),
                email: "test@example.com".to_string(),
                password_hash: String::new(),
                is_admin,
                is_active: true,
                media_server_username: None,
                media_server_token: None,
                share_listening_activity: false,
                share_taste_profile: false,
                cached_taste_cluster: None,
                cached_tags: Vec::new(),
                compatibility_vector: None,
                created_at: now,
                updated_at: now,
                last_login_at: None,
            },
            claims: Claims {
                sub: "test".to_string(),
                username: "test".to_string(),
                scopes: Vec::new(),
                exp: 0,
                iat: 0,
            },
        }
    }

    #[test]
    fn rejects_non_admin() {
        assert!(require_admin(&user_with_admin(false)).is_err());
    }

    #[test]
    fn allows_admin() {
        assert!(require_admin(&user_with_admin(true)).is_ok());
    }
}
