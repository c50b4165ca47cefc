//! Import stage: hands a completed download off to beets for the final
//! library layout, then records the result.

use std::path::Path;

use crate::error::Result;
use crate::models::download::{Download, DownloadStatus};
use crate::services::{EntityStore, Fanout, IntegrationRegistry, SettingsStore};

pub async fn run(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    fanout: &Fanout,
    download: &Download,
) -> Result<()> {
    let Some(path) = download.final_path.clone() else {
        let updated = entities
            .downloads
            .transition(
                download.id,
                DownloadStatus::Failed,
                None,
                None,
                None,
                None,
                Some("import attempted with no resolved download path"),
            )
            .await?;
        fanout.publish_download_update(&updated).await;
        return Ok(());
    };

    let move_files = settings.bool("beets.move_files", true).await;
    let outcome = integrations
        .beets
        .import_directory(Path::new(&path), Some(&download.artist_name), Some(&download.album_title), move_files)
        .await;

    if outcome.success {
        let final_path = outcome.final_path.unwrap_or(path);
        let updated = entities
            .downloads
            .transition(download.id, DownloadStatus::Completed, None, None, None, Some(&final_path), None)
            .await?;
        fanout.publish_download_update(&updated).await;

        if download.download_client.as_deref() == Some("sabnzbd") {
            if let Some(job_id) = &download.client_job_id {
                if settings.bool("sabnzbd.remove_completed", false).await {
                    integrations.sabnzbd.delete_history(job_id, true).await;
                }
            }
        }
    } else {
        let reason = outcome.error.unwrap_or_else(|| "beets import failed".to_string());
        let updated = entities
            .downloads
            .transition(download.id, DownloadStatus::Failed, None, None, None, None, Some(&reason))
            .await?;
        fanout.publish_download_update(&updated).await;
    }

    Ok(())
}
