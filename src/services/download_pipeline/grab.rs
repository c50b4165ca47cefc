//! Grab stage: routes a `found` release to the right download client and
//! advances the Download to `downloading` (or `queued` if the torrent hash
//! isn't known yet), or to `failed` if every route is exhausted.

use std::time::Duration;

use crate::error::Result;
use crate::models::download::{Download, DownloadStatus};
use crate::services::integrations::prowlarr::{Protocol, ReleaseRecord};
use crate::services::{EntityStore, Fanout, IntegrationRegistry, SettingsStore};

const GRAB_HASH_RESOLVE_TIMEOUT: Duration = Duration::from_secs(2);
const FALLBACK_HASH_RESOLVE_TIMEOUT: Duration = Duration::from_secs(15);
const HASH_RESOLVE_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    fanout: &Fanout,
    download: &Download,
    release: &ReleaseRecord,
) -> Result<bool> {
    match release.protocol {
        Protocol::Usenet => grab_usenet(entities, integrations, settings, fanout, download, release).await,
        Protocol::Torrent => grab_torrent(entities, integrations, settings, fanout, download, release).await,
    }
}

async fn grab_usenet(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    fanout: &Fanout,
    download: &Download,
    release: &ReleaseRecord,
) -> Result<bool> {
    if !integrations.sabnzbd.is_available() {
        return fail(entities, fanout, download, "sabnzbd is not configured").await;
    }

    let category = settings.string("sabnzbd.category", "vibarr").await;
    match integrations
        .sabnzbd
        .add_nzb_url(&release.download_url, Some(&category), Some(&release.title))
        .await
    {
        Some(nzo_id) => {
            let updated = entities
                .downloads
                .transition(
                    download.id,
                    DownloadStatus::Downloading,
                    Some("sabnzbd"),
                    Some(&nzo_id),
                    None,
                    None,
                    None,
                )
                .await?;
            fanout.publish_download_update(&updated).await;
            Ok(true)
        }
        None => fail(entities, fanout, download, "sabnzbd rejected add_nzb_url").await,
    }
}

async fn grab_torrent(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    fanout: &Fanout,
    download: &Download,
    release: &ReleaseRecord,
) -> Result<bool> {
    let grab_result = integrations.prowlarr.grab(&release.guid, release.indexer_id).await;

    if grab_result.success {
        if let Some(client_job_id) = &grab_result.download_id {
            let updated = entities
                .downloads
                .transition(
                    download.id,
                    DownloadStatus::Downloading,
                    Some("qbittorrent"),
                    Some(client_job_id),
                    None,
                    None,
                    None,
                )
                .await?;
            fanout.publish_download_update(&updated).await;
            return Ok(true);
        }

        if let Some(hash) = integrations
            .qbittorrent
            .find_torrent_hash(&release.title, GRAB_HASH_RESOLVE_TIMEOUT, HASH_RESOLVE_INTERVAL)
            .await
        {
            let updated = entities
                .downloads
                .transition(
                    download.id,
                    DownloadStatus::Downloading,
                    Some("qbittorrent"),
                    Some(&hash),
                    None,
                    None,
                    None,
                )
                .await?;
            fanout.publish_download_update(&updated).await;
            return Ok(true);
        }
    }

    // Prowlarr grab failed, or we couldn't resolve its job to a torrent hash
    // in time — fall back to adding the magnet/torrent URL directly.
    let category = settings.string("qbittorrent.category", "vibarr").await;
    let save_path = settings
        .string("qbittorrent.incomplete_path", "/downloads/incomplete")
        .await;
    integrations.qbittorrent.ensure_category(&category, &save_path).await;

    if !integrations
        .qbittorrent
        .add_torrent_url(&release.download_url, Some(&category), Some(&save_path), None)
        .await
    {
        return fail(entities, fanout, download, "qbittorrent rejected add_torrent_url").await;
    }

    match integrations
        .qbittorrent
        .find_torrent_hash(&release.title, FALLBACK_HASH_RESOLVE_TIMEOUT, HASH_RESOLVE_INTERVAL)
        .await
    {
        Some(hash) => {
            let updated = entities
                .downloads
                .transition(
                    download.id,
                    DownloadStatus::Downloading,
                    Some("qbittorrent"),
                    Some(&hash),
                    None,
                    None,
                    None,
                )
                .await?;
            fanout.publish_download_update(&updated).await;
        }
        None => {
            let updated = entities
                .downloads
                .transition(download.id, DownloadStatus::Queued, Some("qbittorrent"), None, None, None, None)
                .await?;
            fanout.publish_download_update(&updated).await;
        }
    }

    Ok(true)
}

async fn fail(entities: &EntityStore, fanout: &Fanout, download: &Download, reason: &str) -> Result<bool> {
    let updated = entities
        .downloads
        .transition(download.id, DownloadStatus::Failed, None, None, None, None, Some(reason))
        .await?;
    fanout.publish_download_update(&updated).await;
    Ok(false)
}
