//! The nine built-in jobs. The three that only touch Plex/catalog data are
//! implemented directly here; the rest forward into the download pipeline,
//! recommendation engine, and rules engine, which own the actual algorithms.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::models::album::{AlbumType, ReleaseType};
use crate::models::artist::Artist;
use crate::models::listening_event::ListeningEvent;
use crate::services::{EntityStore, Fanout, IntegrationRegistry, SettingsStore};

use super::{JobDefinition, JobOutcome};

/// Bundle passed into every job handler. Cheap to clone: every field is
/// itself a handle over shared state.
#[derive(Clone)]
pub struct SchedulerContext {
    pub entities: EntityStore,
    pub settings: SettingsStore,
    pub integrations: IntegrationRegistry,
    pub fanout: Fanout,
}

pub fn build_job_table() -> Vec<JobDefinition> {
    vec![
        JobDefinition::new(
            "sync-plex-library",
            "0 0 */6 * * *",
            None,
            Arc::new(|ctx| Box::pin(sync_plex_library(ctx))),
        ),
        JobDefinition::new(
            "sync-listening-history",
            "0 15 */2 * * *",
            None,
            Arc::new(|ctx| Box::pin(sync_listening_history(ctx))),
        ),
        JobDefinition::new(
            "check-new-releases",
            "0 30 */6 * * *",
            None,
            Arc::new(|ctx| Box::pin(check_new_releases(ctx))),
        ),
        JobDefinition::new(
            "generate-daily-recommendations",
            "0 0 3 * * *",
            None,
            Arc::new(|ctx| Box::pin(generate_daily_recommendations(ctx))),
        ),
        JobDefinition::new(
            "update-taste-profile",
            "0 0 4 * * SUN",
            None,
            Arc::new(|ctx| Box::pin(update_taste_profile(ctx))),
        ),
        JobDefinition::new(
            "process-wishlist",
            "0 0 * * * *",
            None,
            Arc::new(|ctx| Box::pin(process_wishlist(ctx))),
        ),
        JobDefinition::new(
            "check-download-status",
            "0 */5 * * * *",
            None,
            Arc::new(|ctx| Box::pin(check_download_status(ctx))),
        ),
        JobDefinition::new(
            "check-playlist-urls",
            "0 */5 * * * *",
            None,
            Arc::new(|ctx| Box::pin(check_playlist_urls(ctx))),
        ),
        JobDefinition::new(
            "generate-discover-weekly",
            "0 0 5 * * MON",
            None,
            Arc::new(|ctx| Box::pin(generate_discover_weekly(ctx))),
        ),
    ]
}

/// Walks the configured Plex music section, upserting every artist and album
/// Plex reports and marking both `in_library`.
async fn sync_plex_library(ctx: SchedulerContext) -> JobOutcome {
    let mut outcome = JobOutcome::default();
    if !ctx.integrations.plex.is_available() {
        return outcome;
    }

    let section_key = ctx.settings.string("plex.section_key", "1").await;
    for remote_artist in ctx.integrations.plex.list_artists(&section_key).await {
        outcome.processed += 1;

        let artist_id = match upsert_artist_from_plex(&ctx.entities, &remote_artist.name, &remote_artist.genres).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, artist = %remote_artist.name, "sync-plex-library: artist upsert failed");
                outcome.errors += 1;
                continue;
            }
        };

        if let Err(e) = ctx
            .entities
            .artists
            .mark_in_library(artist_id, &remote_artist.external_id)
            .await
        {
            warn!(error = %e, artist = %remote_artist.name, "sync-plex-library: mark_in_library failed");
            outcome.errors += 1;
        }

        for remote_album in ctx.integrations.plex.list_albums(&remote_artist.external_id).await {
            match ctx
                .entities
                .albums
                .upsert(
                    artist_id,
                    &remote_album.title,
                    AlbumType::Album,
                    ReleaseType::Studio,
                    remote_album.release_date,
                    None,
                )
                .await
            {
                Ok(saved) => {
                    if let Err(e) = ctx.entities.albums.mark_in_library(saved.id, "flac", None, None).await {
                        warn!(error = %e, album = %remote_album.title, "sync-plex-library: mark_in_library failed");
                        outcome.errors += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, album = %remote_album.title, "sync-plex-library: album upsert failed");
                    outcome.errors += 1;
                }
            }
        }
    }

    outcome
}

async fn upsert_artist_from_plex(entities: &EntityStore, name: &str, genres: &[String]) -> Result<Uuid> {
    if let Some(existing) = entities.artists.find_by_name(name).await? {
        return Ok(existing.id);
    }
    let now = Utc::now();
    let artist = Artist {
        id: Uuid::new_v4(),
        name: name.to_string(),
        sort_name: None,
        disambiguation: None,
        musicbrainz_id: None,
        spotify_id: None,
        discogs_id: None,
        lastfm_url: None,
        biography: None,
        country: None,
        formed_year: None,
        disbanded_year: None,
        genres: genres.to_vec(),
        tags: Vec::new(),
        mean_danceability: None,
        mean_energy: None,
        mean_valence: None,
        mean_tempo: None,
        spotify_popularity: None,
        lastfm_listeners: None,
        lastfm_playcount: None,
        in_library: false,
        media_server_key: None,
        image_urls: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    Ok(entities.artists.upsert(&artist).await?.id)
}

/// Ingests each active user's last 7 days of Plex history since their last
/// recorded play (cold start falls back to a flat 7-day window).
async fn sync_listening_history(ctx: SchedulerContext) -> JobOutcome {
    let mut outcome = JobOutcome::default();
    if !ctx.integrations.plex.is_available() {
        return outcome;
    }

    let users = match ctx.entities.users.list_active().await {
        Ok(users) => users,
        Err(e) => {
            warn!(error = %e, "sync-listening-history: could not list users");
            outcome.errors += 1;
            return outcome;
        }
    };

    for user in users {
        if !user.share_listening_activity {
            continue;
        }

        let since = match ctx.entities.listening_events.latest_played_at(user.id).await {
            Ok(Some(last)) => last,
            Ok(None) => Utc::now() - ChronoDuration::days(7),
            Err(e) => {
                warn!(error = %e, user = %user.username, "sync-listening-history: latest_played_at failed");
                outcome.errors += 1;
                continue;
            }
        };

        for entry in ctx.integrations.plex.listening_history_since(since).await {
            outcome.processed += 1;

            let artist_id = match &entry.artist_name {
                Some(name) => ctx.entities.artists.find_by_name(name).await.ok().flatten().map(|a| a.id),
                None => None,
            };

            let event = ListeningEvent {
                id: Uuid::new_v4(),
                user_id: user.id,
                track_id: None,
                album_id: None,
                artist_id,
                media_server_track_key: Some(entry.rating_key.clone()),
                played_at: entry.played_at,
                play_duration_seconds: 0,
                track_duration_seconds: None,
                completion_percent: 100.0,
                skipped: false,
                source: "plex".to_string(),
                device: None,
                player: None,
                created_at: Utc::now(),
            };

            if let Err(e) = ctx.entities.listening_events.record(&event).await {
                warn!(error = %e, user = %user.username, "sync-listening-history: record failed");
                outcome.errors += 1;
            }
        }
    }

    outcome
}

/// For every in-library artist, asks MusicBrainz for releases newer than the
/// artist's latest known album and upserts anything new.
async fn check_new_releases(ctx: SchedulerContext) -> JobOutcome {
    let mut outcome = JobOutcome::default();

    let artists = match ctx.entities.artists.list_in_library(500, 0).await {
        Ok(artists) => artists,
        Err(e) => {
            warn!(error = %e, "check-new-releases: could not list library artists");
            outcome.errors += 1;
            return outcome;
        }
    };

    for artist in artists {
        let Some(mbid) = &artist.musicbrainz_id else {
            continue;
        };

        let releases = ctx.integrations.musicbrainz.release_groups_for_artist(mbid).await;
        for release in releases {
            outcome.processed += 1;
            match ctx
                .entities
                .albums
                .upsert(
                    artist.id,
                    &release.title,
                    AlbumType::Album,
                    ReleaseType::Studio,
                    release.release_date,
                    Some(&release.musicbrainz_release_group_id),
                )
                .await
            {
                Ok(saved) => {
                    if let Err(e) =
                        crate::services::rules_engine::evaluate_new_release_rules(&ctx.entities, &ctx.integrations, artist.id, saved.id)
                            .await
                    {
                        warn!(error = %e, album = %release.title, "check-new-releases: new_release rule evaluation failed");
                        outcome.errors += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, album = %release.title, "check-new-releases: album upsert failed");
                    outcome.errors += 1;
                }
            }
        }
    }

    outcome
}

/// Advances every wishlist item due for a search attempt through the
/// download pipeline's search/grab stage.
async fn process_wishlist(ctx: SchedulerContext) -> JobOutcome {
    let mut outcome = JobOutcome::default();

    let items = match ctx.entities.wishlist.due_for_search(100).await {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "process-wishlist: could not list due items");
            outcome.errors += 1;
            return outcome;
        }
    };

    for item in items {
        outcome.processed += 1;
        match crate::services::download_pipeline::search_and_grab(&ctx.entities, &ctx.integrations, &ctx.settings, &ctx.fanout, &item).await {
            Ok(grabbed) => {
                if grabbed {
                    outcome.grabbed += 1;
                }
            }
            Err(e) => {
                warn!(error = %e, item = %item.id, "process-wishlist: search_and_grab failed");
                outcome.errors += 1;
            }
        }
    }

    outcome
}

/// Polls every active download client job and advances download state
/// (queued -> downloading -> importing -> completed/failed).
async fn check_download_status(ctx: SchedulerContext) -> JobOutcome {
    let mut outcome = JobOutcome::default();

    let downloads = match ctx.entities.downloads.list_active().await {
        Ok(downloads) => downloads,
        Err(e) => {
            warn!(error = %e, "check-download-status: could not list active downloads");
            outcome.errors += 1;
            return outcome;
        }
    };

    for download in downloads {
        outcome.processed += 1;
        if let Err(e) = crate::services::download_pipeline::poll_and_advance(&ctx.entities, &ctx.integrations, &ctx.settings, &ctx.fanout, &download).await {
            warn!(error = %e, download = %download.id, "check-download-status: poll failed");
            outcome.errors += 1;
        }
    }

    outcome
}

/// Rebuilds every recommendation category (except the weekly/radar batch
/// jobs, which run on their own schedule) for every active user.
async fn generate_daily_recommendations(ctx: SchedulerContext) -> JobOutcome {
    run_per_active_user(&ctx, "generate-daily-recommendations", |ctx, user| {
        Box::pin(async move { crate::services::recommendation::generate_daily(&ctx.entities, &ctx.integrations, &ctx.settings, &user).await })
    })
    .await
}

/// Recomputes each active user's taste profile and embedding from the past
/// listening window.
async fn update_taste_profile(ctx: SchedulerContext) -> JobOutcome {
    run_per_active_user(&ctx, "update-taste-profile", |ctx, user| {
        Box::pin(async move {
            crate::services::recommendation::update_taste_profile(&ctx.entities, &ctx.settings, &user)
                .await
                .map(|_| 1)
        })
    })
    .await
}

/// Rebuilds the discover-weekly category, trailing the Sunday taste-profile
/// recompute by a day so it works from the freshest snapshot.
async fn generate_discover_weekly(ctx: SchedulerContext) -> JobOutcome {
    run_per_active_user(&ctx, "generate-discover-weekly", |ctx, user| {
        Box::pin(async move { crate::services::recommendation::generate_discover_weekly(&ctx.entities, &ctx.integrations, &ctx.settings, &user).await })
    })
    .await
}

async fn run_per_active_user<F>(ctx: &SchedulerContext, job_name: &str, run: F) -> JobOutcome
where
    F: Fn(
        SchedulerContext,
        crate::models::user::User,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<i64>> + Send>>,
{
    let mut outcome = JobOutcome::default();

    let users = match ctx.entities.users.list_active().await {
        Ok(users) => users,
        Err(e) => {
            warn!(error = %e, job = job_name, "could not list active users");
            outcome.errors += 1;
            return outcome;
        }
    };

    for user in users {
        outcome.processed += 1;
        match run(ctx.clone(), user.clone()).await {
            Ok(generated) => outcome.grabbed += generated,
            Err(e) => {
                warn!(error = %e, job = job_name, user = %user.username, "job failed for user");
                outcome.errors += 1;
            }
        }
    }

    outcome
}

/// Evaluates every rule subscribed to the `playlist_url_check` trigger.
async fn check_playlist_urls(ctx: SchedulerContext) -> JobOutcome {
    match crate::services::rules_engine::evaluate_playlist_url_rules(&ctx.entities, &ctx.integrations).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "check-playlist-urls: evaluation failed");
            JobOutcome {
                processed: 0,
                grabbed: 0,
                errors: 1,
            }
        }
    }
}
