//! Search stage: query Prowlarr, score and gate results, persist the pick as
//! a `found` Download, then decide whether to grab.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::download::{DownloadSource, DownloadStatus};
use crate::models::wishlist::WishlistItem;
use crate::services::integrations::prowlarr::ReleaseRecord;
use crate::services::{EntityStore, Fanout, IntegrationRegistry, SettingsStore};

use super::grab;

const EDITION_WORDS: &[&str] = &[
    "deluxe",
    "expanded",
    "anniversary",
    "collectors",
    "special",
    "superdeluxe",
    "remaster",
    "remastered",
    "reissue",
    "bonus",
    "edition",
];

const QUALITY_TOKENS: &[&str] = &["flac-24", "flac", "320", "v0", "256", "192", "mp3"];
const FORMAT_TOKENS: &[&str] = &["flac", "mp3", "aac", "ogg", "opus"];

fn tokenize(text: &str) -> HashSet<String> {
    let normalized = text
        .to_lowercase()
        .replace('&', " and ")
        .replace('+', " and ");

    normalized
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|token| !EDITION_WORDS.contains(token))
        .map(|token| token.to_string())
        .collect()
}

fn coverage(target: &HashSet<String>, candidate: &HashSet<String>) -> f64 {
    if target.is_empty() {
        return 0.0;
    }
    target.intersection(candidate).count() as f64 / target.len() as f64
}

struct Relevance {
    artist_coverage: f64,
    album_coverage: f64,
    overlap_ratio: f64,
    passes: bool,
}

fn text_relevance(release_title: &str, artist: &str, album: &str) -> Relevance {
    let release_tokens = tokenize(release_title);
    let artist_tokens = tokenize(artist);
    let album_tokens = tokenize(album);
    let target_tokens: HashSet<String> = artist_tokens.union(&album_tokens).cloned().collect();

    let overlap_ratio = coverage(&target_tokens, &release_tokens);

    Relevance {
        artist_coverage: coverage(&artist_tokens, &release_tokens),
        album_coverage: coverage(&album_tokens, &release_tokens),
        overlap_ratio,
        passes: overlap_ratio >= 0.6,
    }
}

fn title_match_score(relevance: &Relevance) -> f64 {
    let mut score = (relevance.artist_coverage * 24.0 + relevance.album_coverage * 26.0).min(50.0);
    if relevance.overlap_ratio < 0.55 {
        score *= 0.5;
    }
    if relevance.artist_coverage < 0.45 {
        score *= 0.7;
    }
    if relevance.album_coverage < 0.45 {
        score *= 0.7;
    }
    score
}

fn detect_token<'a>(title: &str, tokens: &[&'a str]) -> Option<&'a str> {
    let lower = title.to_lowercase();
    tokens.iter().find(|t| lower.contains(*t)).copied()
}

fn format_score(preferred_format: &str, detected_quality: Option<&str>) -> f64 {
    let preferred_lossless = preferred_format.eq_ignore_ascii_case("flac");
    match detected_quality {
        None => 22.0,
        Some(quality) => {
            let detected_lossless = matches!(quality, "flac-24" | "flac");
            match (preferred_lossless, detected_lossless) {
                (true, true) => 30.0,
                (false, false) => 28.0,
                _ => 24.0,
            }
        }
    }
}

fn seeder_score(seeders: Option<i32>) -> f64 {
    match seeders {
        Some(s) if s > 100 => 15.0,
        Some(s) if s > 50 => 11.0,
        Some(s) if s > 20 => 8.0,
        Some(s) if s > 5 => 5.0,
        Some(s) if s > 0 => 3.0,
        _ => 0.0,
    }
}

fn size_score(size_bytes: i64) -> f64 {
    const MIN: i64 = 50 * 1024 * 1024;
    const MAX: i64 = 2 * 1024 * 1024 * 1024;
    if size_bytes > MIN && size_bytes < MAX {
        5.0
    } else {
        0.0
    }
}

/// Weighted sum scoring a release against `"{artist} {album}"`, with the
/// text-relevance gate computed first so a high-seed wrong-album release
/// never outranks a correct low-seed one.
pub fn score_release(
    release: &ReleaseRecord,
    artist: &str,
    album: &str,
    preferred_format: &str,
) -> (f64, bool) {
    let relevance = text_relevance(&release.title, artist, album);
    let quality = detect_token(&release.title, QUALITY_TOKENS);
    let _format = detect_token(&release.title, FORMAT_TOKENS);

    let score = title_match_score(&relevance)
        + format_score(preferred_format, quality)
        + seeder_score(release.seeders)
        + size_score(release.size_bytes);

    (score, relevance.passes)
}

/// Runs Search and, when the gate passes (or `auto_gate` is false, i.e. a
/// user-triggered single search), Grab. Returns whether a download was
/// actually grabbed.
pub async fn run(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    fanout: &Fanout,
    item: &WishlistItem,
    auto_gate: bool,
) -> Result<bool> {
    entities.wishlist.mark_searching(item.id).await?;

    let artist = item.artist_name.clone().unwrap_or_default();
    let album = item.album_title.clone().unwrap_or_default();
    let preferred_format = match &item.preferred_format {
        Some(format) => format.clone(),
        None => settings.string("automation.preferred_quality", "flac").await,
    };

    let mut results = integrations
        .prowlarr
        .search_album(&artist, &album, |release| {
            score_release(release, &artist, &album, &preferred_format)
        })
        .await;

    results.sort_by(|a, b| {
        b.passes_text_relevance
            .cmp(&a.passes_text_relevance)
            .then(b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
    });

    let Some(top) = results.into_iter().next() else {
        entities.wishlist.revert_to_wanted(item.id).await?;
        return Ok(false);
    };

    let download = entities
        .downloads
        .create(Some(item.id), &artist, &album, DownloadSource::Wishlist)
        .await?;
    let download = entities
        .downloads
        .transition(
            download.id,
            DownloadStatus::Found,
            None,
            None,
            Some(top.score),
            None,
            None,
        )
        .await?;
    fanout.publish_download_update(&download).await;

    if auto_gate {
        let enabled = settings.bool("automation.auto_download_enabled", false).await;
        let threshold = settings
            .float("automation.auto_download_confidence_threshold", 0.8)
            .await;
        let max_concurrent = settings.int("automation.max_concurrent_downloads", 3).await;
        let active = entities.downloads.count_active().await?;

        if !(enabled && top.score >= threshold * 100.0 && active < max_concurrent) {
            return Ok(false);
        }
    }

    grab::run(entities, integrations, settings, fanout, &download, &top.release).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(title: &str, seeders: Option<i32>, size_bytes: i64) -> ReleaseRecord {
        ReleaseRecord {
            guid: "guid".to_string(),
            indexer_id: 1,
            title: title.to_string(),
            size_bytes,
            seeders,
            leechers: None,
            protocol: crate::services::integrations::prowlarr::Protocol::Torrent,
            download_url: "https://example.test/dl".to_string(),
            info_url: None,
            publish_date: chrono::Utc::now(),
            categories: vec![3000],
        }
    }

    #[test]
    fn exact_match_passes_text_relevance() {
        let r = release("Artist Name - Album Title [FLAC]", Some(200), 400_000_000);
        let (score, passes) = score_release(&r, "Artist Name", "Album Title", "flac");
        assert!(passes);
        assert!(score > 60.0);
    }

    #[test]
    fn unrelated_release_fails_relevance_despite_high_seeders() {
        let r = release("Completely Different Thing [FLAC]", Some(5000), 400_000_000);
        let (_, passes) = score_release(&r, "Artist Name", "Album Title", "flac");
        assert!(!passes);
    }

    #[test]
    fn edition_words_are_not_counted_against_overlap() {
        let relevance = text_relevance("Artist Name Album Title Deluxe Edition", "Artist Name", "Album Title");
        assert!(relevance.overlap_ratio >= 0.99);
    }
}
