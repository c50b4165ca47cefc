//! Poll stage, driven by the `check-download-status` job every 5 minutes:
//! refreshes progress for active downloads and advances them on completion
//! or client-side error.

use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use crate::error::Result;
use crate::models::download::{Download, DownloadStatus};
use crate::services::{EntityStore, Fanout, IntegrationRegistry, SettingsStore};

use super::import;

const HASH_RESOLVE_RETRY_TIMEOUT: Duration = Duration::from_secs(2);
const HASH_RESOLVE_INTERVAL: Duration = Duration::from_millis(500);
const QUEUED_HASH_TIMEOUT_SECS: i64 = 180;

pub async fn run(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    fanout: &Fanout,
    download: &Download,
) -> Result<()> {
    match download.download_client.as_deref() {
        Some("sabnzbd") => poll_sabnzbd(entities, integrations, settings, fanout, download).await,
        Some("qbittorrent") => poll_qbittorrent(entities, integrations, settings, fanout, download).await,
        _ => Ok(()),
    }
}

async fn poll_qbittorrent(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    fanout: &Fanout,
    download: &Download,
) -> Result<()> {
    let hash = match &download.client_job_id {
        Some(hash) => hash.clone(),
        None => {
            let title = download.release_title.as_deref().unwrap_or(&download.album_title);
            match integrations
                .qbittorrent
                .find_torrent_hash(title, HASH_RESOLVE_RETRY_TIMEOUT, HASH_RESOLVE_INTERVAL)
                .await
            {
                Some(hash) => {
                    let updated = entities
                        .downloads
                        .transition(download.id, DownloadStatus::Downloading, None, Some(&hash), None, None, None)
                        .await?;
                    fanout.publish_download_update(&updated).await;
                    hash
                }
                None => {
                    let timed_out = download
                        .started_at
                        .map(|started| (Utc::now() - started).num_seconds() > QUEUED_HASH_TIMEOUT_SECS)
                        .unwrap_or(false);
                    if timed_out {
                        let updated = entities
                            .downloads
                            .transition(
                                download.id,
                                DownloadStatus::Failed,
                                None,
                                None,
                                None,
                                None,
                                Some("hash resolution timed out"),
                            )
                            .await?;
                        fanout.publish_download_update(&updated).await;
                    }
                    return Ok(());
                }
            }
        }
    };

    let Some(torrent) = integrations.qbittorrent.get_torrent(&hash).await else {
        // Transient lookup failure; try again next tick rather than failing
        // a download on a single missed poll.
        return Ok(());
    };

    if torrent.state.to_lowercase().contains("error") {
        let updated = entities
            .downloads
            .transition(
                download.id,
                DownloadStatus::Failed,
                None,
                None,
                None,
                None,
                Some(&format!("qbittorrent reported state {}", torrent.state)),
            )
            .await?;
        fanout.publish_download_update(&updated).await;
        return Ok(());
    }

    let completed = torrent.progress >= 1.0
        || matches!(torrent.state.as_str(), "uploading" | "stalledUP" | "pausedUP" | "queuedUP");

    if completed {
        entities
            .downloads
            .update_progress(download.id, Some(100.0), Some(0), Some(0), torrent.content_path.as_deref())
            .await?;
        complete_download(entities, integrations, settings, fanout, download, torrent.content_path.as_deref()).await?;

        if settings.bool("qbittorrent.remove_completed", false).await {
            integrations.qbittorrent.delete(&hash, false).await;
        }
        return Ok(());
    }

    entities
        .downloads
        .update_progress(
            download.id,
            Some(torrent.progress * 100.0),
            Some(torrent.dlspeed),
            Some(torrent.eta),
            torrent.content_path.as_deref(),
        )
        .await?;
    fanout.publish_download_update(&entities.downloads.get(download.id).await?).await;

    Ok(())
}

async fn poll_sabnzbd(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    fanout: &Fanout,
    download: &Download,
) -> Result<()> {
    let Some(nzo_id) = &download.client_job_id else {
        return Ok(());
    };

    let queue = integrations.sabnzbd.queue().await;
    if let Some(slot) = queue.iter().find(|s| &s.nzo_id == nzo_id) {
        let percentage: f64 = slot.percentage.parse().unwrap_or(0.0);
        entities
            .downloads
            .update_progress(download.id, Some(percentage), None, None, None)
            .await?;
        fanout.publish_download_update(&entities.downloads.get(download.id).await?).await;
        return Ok(());
    }

    let history = integrations.sabnzbd.history().await;
    let Some(slot) = history.iter().find(|s| &s.nzo_id == nzo_id) else {
        // Neither queued nor in history yet; a transient gap, retry next tick.
        return Ok(());
    };

    if slot.status.eq_ignore_ascii_case("failed") {
        let updated = entities
            .downloads
            .transition(
                download.id,
                DownloadStatus::Failed,
                None,
                None,
                None,
                None,
                Some(if slot.fail_message.is_empty() {
                    "sabnzbd reported a failed download"
                } else {
                    &slot.fail_message
                }),
            )
            .await?;
        fanout.publish_download_update(&updated).await;
        return Ok(());
    }

    complete_download(entities, integrations, settings, fanout, download, Some(slot.storage.as_str())).await
}

async fn complete_download(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    fanout: &Fanout,
    download: &Download,
    content_path: Option<&str>,
) -> Result<()> {
    let beets_enabled = settings.bool("beets.enabled", false).await;
    let auto_import = settings.bool("beets.auto_import", true).await;

    if !(beets_enabled && auto_import && integrations.beets.is_available().await) {
        let updated = entities
            .downloads
            .transition(download.id, DownloadStatus::Completed, None, None, None, content_path, None)
            .await?;
        fanout.publish_download_update(&updated).await;
        return Ok(());
    }

    let importing = entities
        .downloads
        .transition(download.id, DownloadStatus::Importing, None, None, None, content_path, None)
        .await?;
    fanout.publish_download_update(&importing).await;

    if let Err(e) = import::run(entities, integrations, settings, fanout, &importing).await {
        warn!(error = %e, download = %download.id, "import stage failed");
    }

    Ok(())
}
