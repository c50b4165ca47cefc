use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::rule::{AutomationRule, RuleAction, RuleCondition, RuleTrigger};
use crate::models::user::AuthenticatedUser;
use crate::services::rules_engine;
use crate::services::scheduler::JobOutcome;
use crate::AppState;

pub async fn list_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<AutomationRule>>> {
    Ok(Json(state.entities.rules.list_for_user(user.user.id).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    pub trigger: RuleTrigger,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
    #[serde(default)]
    pub priority: i32,
}

pub async fn create_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<AutomationRule>)> {
    let rule = state
        .entities
        .rules
        .create(
            user.user.id,
            &request.name,
            request.trigger,
            &request.conditions,
            &request.actions,
            request.priority,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

pub async fn set_enabled_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthenticatedUser,
    Json(request): Json<SetEnabledRequest>,
) -> Result<Json<AutomationRule>> {
    state.entities.rules.set_enabled(id, request.enabled).await?;
    Ok(Json(state.entities.rules.get(id).await?))
}

pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<StatusCode> {
    state.entities.rules.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Forces an immediate pass of `playlist_url_check` rules, rather than
/// waiting for the scheduler's own tick.
pub async fn check_playlist_urls_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<JobOutcome>> {
    if !user.user.is_admin {
        return Err(crate::error::AppError::Forbidden {
            reason: "admin access required".to_string(),
        });
    }
    let outcome =
        rules_engine::evaluate_playlist_url_rules(&state.entities, &state.integrations).await?;
    Ok(Json(outcome))
}
