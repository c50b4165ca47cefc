use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::download::{Download, DownloadStatus};
use crate::models::user::AuthenticatedUser;
use crate::services::download_pipeline;
use crate::AppState;

pub async fn list_active_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<Download>>> {
    Ok(Json(state.entities.downloads.list_active().await?))
}

pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<Json<Download>> {
    Ok(Json(state.entities.downloads.get(id).await?))
}

/// Advances one download through Poll immediately rather than waiting for
/// the `check-download-status` job's next tick.
pub async fn poll_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<Json<Download>> {
    let download = state.entities.downloads.get(id).await?;
    download_pipeline::poll_and_advance(
        &state.entities,
        &state.integrations,
        &state.settings,
        &state.fanout,
        &download,
    )
    .await?;
    Ok(Json(state.entities.downloads.get(id).await?))
}

pub async fn cancel_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<Json<Download>> {
    let download = state.entities.downloads.get(id).await?;
    if download.status.is_terminal() {
        return Err(AppError::Conflict {
            message: "download has already reached a terminal state".to_string(),
        });
    }
    state
        .entities
        .downloads
        .transition(
            id,
            DownloadStatus::Cancelled,
            None,
            None,
            None,
            None,
            Some("cancelled by user"),
        )
        .await?;
    Ok(Json(state.entities.downloads.get(id).await?))
}
