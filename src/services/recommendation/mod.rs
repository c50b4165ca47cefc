//! Recommendation engine: listening-history analysis, taste embedding, and
//! multi-source candidate generation feeding a weighted scorer and a
//! diversification pass. Invoked both by the scheduler and by user-driven
//! refresh.

mod affinity;
mod candidates;
pub mod diversify;
mod embedding;
mod scoring;

use std::collections::{HashMap, HashSet};

use chrono::{Duration as ChronoDuration, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::models::album::is_recent_release;
use crate::models::artist::Artist;
use crate::models::listening_event::ListeningEvent;
use crate::models::recommendation::{RecommendationCategory, RecommendationType, ScoredCandidate};
use crate::models::taste_profile::{ClusterAssignment, TasteProfile, TasteSnapshot, TasteTrend};
use crate::models::user::User;
use crate::services::{EntityStore, IntegrationRegistry, SettingsStore};

const TOP_ARTISTS_N: usize = 10;
const TOP_GENRES_N: usize = 5;
const RECENT_HISTORY_DAYS: i64 = 14;

fn category_ttl_days(category: RecommendationCategory) -> i64 {
    use RecommendationCategory::*;
    match category {
        SimilarArtists | GenreExplore | DiscoverWeekly => 7,
        DeepCuts | ReleaseRadar => 14,
        MoodBased => 3,
    }
}

async fn fetch_artists_by_id(entities: &EntityStore, events: &[ListeningEvent]) -> HashMap<Uuid, Artist> {
    let mut ids: HashSet<Uuid> = events.iter().filter_map(|e| e.artist_id).collect();
    let mut out = HashMap::new();
    for id in ids.drain() {
        if let Ok(artist) = entities.artists.get(id).await {
            out.insert(id, artist);
        }
    }
    out
}

fn top_artists_from_affinity(
    affinity: &HashMap<Uuid, f64>,
    artists_by_id: &HashMap<Uuid, Artist>,
    n: usize,
) -> Vec<(Artist, f64)> {
    let mut ranked = affinity::top_n(affinity, n * 2);
    ranked.retain(|(id, _)| artists_by_id.contains_key(id));
    ranked
        .into_iter()
        .take(n)
        .filter_map(|(id, score)| artists_by_id.get(&id).cloned().map(|a| (a, score)))
        .collect()
}

/// Gathers the listening-history inputs every recommendation/profile job
/// needs: the raw window of events, an artist lookup for those events, and
/// the normalized artist/genre affinity maps.
struct TasteInputs {
    events: Vec<ListeningEvent>,
    artists_by_id: HashMap<Uuid, Artist>,
    artist_affinity: HashMap<Uuid, f64>,
    genre_affinity: HashMap<String, f64>,
}

async fn gather_taste_inputs(entities: &EntityStore, settings: &SettingsStore, user: &User) -> Result<TasteInputs> {
    let now = Utc::now();
    let window_days = settings.int("recommendations.affinity_window_days", 180).await;
    let artist_half_life = settings.float("recommendations.artist_affinity_half_life_days", 14.0).await;
    let genre_half_life = settings.float("recommendations.genre_affinity_half_life_days", 21.0).await;

    let events = entities.listening_events.since(user.id, now - ChronoDuration::days(window_days)).await?;
    let artists_by_id = fetch_artists_by_id(entities, &events).await;
    let artist_affinity = affinity::artist_affinity(&events, now, artist_half_life);
    let genre_affinity = affinity::genre_affinity(&events, &artists_by_id, now, genre_half_life);

    Ok(TasteInputs {
        events,
        artists_by_id,
        artist_affinity,
        genre_affinity,
    })
}

/// Runs the five candidate producers, scores, and diversifies. Shared by
/// the daily rebuild and the discover-weekly batch.
async fn build_recommendations(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    inputs: &TasteInputs,
    user_id: Uuid,
) -> Vec<ScoredCandidate> {
    let now = Utc::now();
    let top_artists = top_artists_from_affinity(&inputs.artist_affinity, &inputs.artists_by_id, TOP_ARTISTS_N);
    let top_genres = affinity::top_n(&inputs.genre_affinity, TOP_GENRES_N);

    let recent_events: Vec<ListeningEvent> = inputs
        .events
        .iter()
        .filter(|e| e.age_days(now) <= RECENT_HISTORY_DAYS as f64)
        .cloned()
        .collect();
    let recent_affinity = affinity::artist_affinity(&recent_events, now, 14.0);
    let recent_artists = top_artists_from_affinity(&recent_affinity, &inputs.artists_by_id, 3);

    let mut raw = Vec::new();
    raw.extend(candidates::similar_artists(entities, integrations, &top_artists).await);
    raw.extend(candidates::genre_explore(entities, integrations, &top_genres).await);
    raw.extend(candidates::deep_cuts(entities, &top_artists).await);
    raw.extend(candidates::mood_based(entities, integrations).await);
    raw.extend(candidates::history_based(entities, integrations, &recent_artists).await);

    let known_artist_ids: HashSet<Uuid> = inputs.artists_by_id.keys().copied().collect();
    let novelty_preference = affinity::novelty_preference(known_artist_ids.len(), inputs.events.len());
    let category_feedback = HashMap::new(); // no feedback-history query exists yet; factor drops out
    let user_embedding = entities
        .taste_profiles
        .latest(user_id)
        .await
        .ok()
        .flatten()
        .map(|p| embedding::vector(&p.embedding()));

    let ctx = scoring::ScoringContext {
        genre_affinity: &inputs.genre_affinity,
        artist_affinity: &inputs.artist_affinity,
        known_artist_ids: &known_artist_ids,
        novelty_preference,
        category_feedback: &category_feedback,
        user_embedding,
    };

    let scored: Vec<ScoredCandidate> = raw
        .into_iter()
        .map(|candidate| {
            let (confidence, factors) = scoring::score(&candidate, &ctx);
            scoring::into_scored(candidate, confidence, factors)
        })
        .collect();

    diversify::diversify(scored)
}

/// Scans every in-library artist's catalog for releases within the
/// configured lookback window that aren't in the library yet.
async fn build_release_radar(entities: &EntityStore, settings: &SettingsStore) -> Result<Vec<ScoredCandidate>> {
    let window_days = settings.int("recommendations.release_radar_window_days", 30).await;
    let today = Utc::now().date_naive();
    let artists = entities.artists.list_in_library(500, 0).await?;

    let mut out = Vec::new();
    for artist in artists {
        let albums = match entities.albums.list_for_artist(artist.id).await {
            Ok(albums) => albums,
            Err(e) => {
                warn!(error = %e, artist = %artist.name, "release-radar: could not list albums");
                continue;
            }
        };
        for album in albums {
            let Some(release_date) = album.release_date else { continue };
            if album.in_library || !is_recent_release(release_date, today, window_days) {
                continue;
            }
            out.push(ScoredCandidate {
                recommendation_type: RecommendationType::Album,
                category: RecommendationCategory::ReleaseRadar,
                artist_id: Some(artist.id),
                album_id: Some(album.id),
                track_id: None,
                basis_artist_id: Some(artist.id),
                basis_album_id: None,
                reason: format!("new release from {}", artist.name),
                reason_bullets: vec![],
                confidence: 0.9,
                relevance: 0.9,
                novelty: 1.0,
                factors: HashMap::new(),
            });
        }
    }
    Ok(out)
}

/// Rebuilds every recommendation category except discover-weekly for one
/// user: deletes expired rows, runs the five producers plus release radar,
/// and persists survivors under category-specific TTLs.
pub async fn generate_daily(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    user: &User,
) -> Result<i64> {
    entities.recommendations.delete_expired().await?;

    let inputs = gather_taste_inputs(entities, settings, user).await?;
    let mut candidates = build_recommendations(entities, integrations, &inputs, user.id).await;
    candidates.extend(build_release_radar(entities, settings).await?);

    let mut by_category: HashMap<RecommendationCategory, Vec<ScoredCandidate>> = HashMap::new();
    for candidate in candidates {
        by_category.entry(candidate.category).or_default().push(candidate);
    }

    let mut persisted = 0i64;
    for (category, group) in by_category {
        let rows = entities
            .recommendations
            .persist_batch(user.id, &group, category_ttl_days(category))
            .await?;

        if let Some(first) = rows.first() {
            if let Err(e) =
                crate::services::rules_engine::evaluate_recommendation_generated_rules(entities, integrations, user.id, first.id)
                    .await
            {
                warn!(error = %e, user_id = %user.id, category = ?category, "recommendation_generated rule evaluation failed");
            }
        }

        persisted += rows.len() as i64;
    }

    Ok(persisted)
}

/// Rebuilds the discover-weekly category: runs the same candidate pipeline
/// as the daily job, then re-tags the top N candidates (regardless of their
/// originating category) under one playlist grouping.
pub async fn generate_discover_weekly(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    user: &User,
) -> Result<i64> {
    let size = settings.int("recommendations.discover_weekly_size", 30).await as usize;
    let inputs = gather_taste_inputs(entities, settings, user).await?;
    let mut candidates = build_recommendations(entities, integrations, &inputs, user.id).await;
    candidates.truncate(size);

    let week_label = Utc::now().format("%G-W%V").to_string();
    for candidate in candidates.iter_mut() {
        candidate.category = RecommendationCategory::DiscoverWeekly;
    }

    let rows = entities
        .recommendations
        .persist_batch(user.id, &candidates, category_ttl_days(RecommendationCategory::DiscoverWeekly))
        .await?;

    for row in &rows {
        if let Err(e) = entities.recommendations.mark_shown(row.id).await {
            warn!(error = %e, recommendation = %row.id, week = %week_label, "discover-weekly: mark_shown failed");
        }
    }

    Ok(rows.len() as i64)
}

/// Recomputes the embedding, affinities, and derived stats for one user and
/// appends a monthly snapshot to the evolution history.
pub async fn update_taste_profile(entities: &EntityStore, settings: &SettingsStore, user: &User) -> Result<()> {
    let inputs = gather_taste_inputs(entities, settings, user).await?;
    let embedding_half_life = settings.float("recommendations.taste_embedding_half_life_days", 21.0).await;
    let now = Utc::now();

    let mut plays = Vec::new();
    for event in &inputs.events {
        let Some(track_id) = event.track_id else { continue };
        let Ok(track) = entities.tracks.get(track_id).await else { continue };
        plays.push(embedding::WeightedPlay {
            features: track.audio_features(),
            age_days: event.age_days(now),
            completion_percent: event.completion_percent,
            skipped: event.skipped,
        });
    }
    let (embedding_vector, _weight) = embedding::weighted_mean(&plays, embedding_half_life);

    let unique_artists: HashSet<Uuid> = inputs.events.iter().filter_map(|e| e.artist_id).collect();
    let unique_albums: HashSet<Uuid> = inputs.events.iter().filter_map(|e| e.album_id).collect();
    let unique_tracks: HashSet<Uuid> = inputs.events.iter().filter_map(|e| e.track_id).collect();
    let novelty_preference = affinity::novelty_preference(unique_artists.len(), inputs.events.len());

    let top_genres = affinity::top_n(&inputs.genre_affinity, TOP_GENRES_N).into_iter().collect::<HashMap<_, _>>();
    let preferred_decades = preferred_decades(entities, &inputs.events, now).await;

    let mut hour_counts = [0i64; 24];
    let mut day_counts = [0i64; 7];
    for event in &inputs.events {
        hour_counts[event.hour_of_day() as usize] += 1;
        day_counts[event.day_of_week() as usize] += 1;
    }
    let peak_hours = top_indices(&hour_counts, 3);
    let peak_days = top_indices(&day_counts, 3);

    let mean = |selector: fn(&embedding::WeightedPlay) -> Option<f64>| -> Option<f64> {
        let values: Vec<f64> = plays.iter().filter_map(selector).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    };

    let cluster_affinities = embedding::cluster_affinities(&embedding_vector);
    let (cluster_name, cluster_confidence) = embedding::nearest_centroid(&embedding_vector);

    let previous = entities.taste_profiles.latest(user.id).await?;

    let previous_embedding = previous.as_ref().map(|p| {
        let features = p.embedding();
        embedding::vector(&features)
    });
    let feature_deltas = previous_embedding
        .as_ref()
        .map(|prev| embedding::feature_deltas(prev, &embedding_vector))
        .unwrap_or_default();

    let profile_data = serde_json::json!({
        "embedding": embedding::to_audio_features(&embedding_vector),
        "cluster_affinities": cluster_affinities,
        "cluster": ClusterAssignment {
            name: cluster_name.clone(),
            confidence: cluster_confidence,
        },
        "evolution_history": previous.as_ref().map(|p| p.evolution_history()).unwrap_or_default(),
    });

    let profile = TasteProfile {
        id: Uuid::new_v4(),
        user_id: user.id,
        version: 0, // overwritten by save_new_version
        top_genres: serde_json::to_value(&top_genres).unwrap_or(serde_json::json!({})),
        preferred_decades: serde_json::to_value(&preferred_decades).unwrap_or(serde_json::json!({})),
        mean_danceability: mean(|p| p.features.danceability),
        mean_energy: mean(|p| p.features.energy),
        mean_valence: mean(|p| p.features.valence),
        mean_tempo: mean(|p| p.features.tempo),
        total_plays: inputs.events.len() as i64,
        total_artists: unique_artists.len() as i64,
        total_albums: unique_albums.len() as i64,
        total_tracks: unique_tracks.len() as i64,
        peak_hours,
        peak_days,
        novelty_preference,
        profile_data,
        computed_at: now,
    };

    let snapshot = TasteSnapshot {
        version: previous.as_ref().map(|p| p.version + 1).unwrap_or(1),
        captured_at: now,
        top_genres,
        novelty_preference,
        embedding: embedding_vector.to_vec(),
        sample_size: inputs.events.len() as i64,
    };
    let mut profile = profile.with_snapshot_appended(snapshot);

    let trend_label = embedding::evolution_trend(&profile.evolution_history());
    if let Some(obj) = profile.profile_data.as_object_mut() {
        obj.insert(
            "trend".to_string(),
            serde_json::to_value(TasteTrend { label: trend_label.to_string(), feature_deltas })
            .unwrap_or(serde_json::Value::Null),
        );
    }

    entities.users.set_cached_taste_cluster(user.id, Some(&cluster_name)).await?;
    entities.taste_profiles.save_new_version(profile).await?;
    Ok(())
}

async fn preferred_decades(
    entities: &EntityStore,
    events: &[ListeningEvent],
    now: chrono::DateTime<Utc>,
) -> HashMap<String, f64> {
    let mut sums: HashMap<String, f64> = HashMap::new();
    for event in events {
        let Some(album_id) = event.album_id else { continue };
        let Ok(album) = entities.albums.get(album_id).await else { continue };
        let Some(year) = album.release_year else { continue };
        let decade = format!("{}s", (year / 10) * 10);
        let weight = affinity::play_weight(event.age_days(now), 21.0, event.completion_percent, event.skipped);
        *sums.entry(decade).or_insert(0.0) += weight;
    }
    let max = sums.values().cloned().fold(0.0_f64, f64::max);
    if max > 0.0 {
        for value in sums.values_mut() {
            *value /= max;
        }
    }
    sums
}

fn top_indices(counts: &[i64], n: usize) -> Vec<i32> {
    let mut indexed: Vec<(usize, i64)> = counts.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.cmp(&a.1));
    indexed.into_iter().filter(|(_, c)| *c > 0).take(n).map(|(i, _)| i as i32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_radar_ttl_is_fourteen_days() {
        assert_eq!(category_ttl_days(RecommendationCategory::ReleaseRadar), 14);
        assert_eq!(category_ttl_days(RecommendationCategory::MoodBased), 3);
        assert_eq!(category_ttl_days(RecommendationCategory::SimilarArtists), 7);
    }

    #[test]
    fn top_indices_skips_zero_counts() {
        let counts = [0, 5, 0, 3, 0, 0, 0, 9, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let top = top_indices(&counts, 3);
        assert_eq!(top, vec![7, 1, 3]);
    }
}
