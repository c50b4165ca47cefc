//! The five candidate producers that feed the recommendation scorer. Each
//! one reasons about a different facet of taste and is blind to what the
//! others surface; diversification (see `diversify.rs`) reconciles overlap.

use chrono::Utc;
use uuid::Uuid;
use tracing::warn;

use crate::error::Result;
use crate::models::album::{AlbumType, ReleaseType};
use crate::models::artist::Artist;
use crate::models::recommendation::{RecommendationCategory, RecommendationType};
use crate::models::track::AudioFeatures;
use crate::services::{EntityStore, IntegrationRegistry};

/// A not-yet-scored suggestion. `basis_artist_id` drives diversification
/// (cap per source artist) and the "source-artist affinity" scoring factor;
/// `candidate_genres` feeds the "genre affinity" factor; `audio_features`
/// feeds the "audio-feature similarity" factor when an artist's per-track
/// means are already known.
pub struct RawCandidate {
    pub recommendation_type: RecommendationType,
    pub category: RecommendationCategory,
    pub artist_id: Option<Uuid>,
    pub album_id: Option<Uuid>,
    pub basis_artist_id: Option<Uuid>,
    pub candidate_genres: Vec<String>,
    pub external_match: Option<f64>,
    pub audio_features: Option<AudioFeatures>,
    pub reason: String,
}

/// Partial feature vector built from an artist's aggregate means, when at
/// least one dimension has actually been computed from plays.
fn artist_features(artist: &Artist) -> Option<AudioFeatures> {
    if artist.mean_danceability.is_none() && artist.mean_energy.is_none() && artist.mean_valence.is_none() && artist.mean_tempo.is_none() {
        return None;
    }
    Some(AudioFeatures {
        danceability: artist.mean_danceability,
        energy: artist.mean_energy,
        valence: artist.mean_valence,
        tempo: artist.mean_tempo,
        ..AudioFeatures::default()
    })
}

/// Deezer's numeric genre ids for the handful of tags a library is likely
/// to surface. Deezer has no name-keyed genre endpoint, so genre-explore
/// falls back to artist search for anything outside this map.
const DEEZER_GENRE_IDS: &[(&str, i64)] = &[
    ("pop", 132),
    ("rap", 116),
    ("hip hop", 116),
    ("rock", 152),
    ("alternative", 85),
    ("electro", 106),
    ("electronic", 106),
    ("dance", 113),
    ("r&b", 165),
    ("randb", 165),
    ("jazz", 129),
    ("classical", 98),
    ("reggae", 144),
    ("metal", 464),
    ("country", 84),
];

fn deezer_genre_id(genre: &str) -> Option<i64> {
    let normalized = genre.to_lowercase();
    DEEZER_GENRE_IDS
        .iter()
        .find(|(name, _)| normalized.contains(name))
        .map(|(_, id)| *id)
}

/// Upserts a library-external artist stub (not `in_library`) so a
/// recommendation can reference a stable id, the same pattern Plex sync
/// uses for artists seen only through an integration.
async fn upsert_candidate_artist(entities: &EntityStore, name: &str, genres: &[String]) -> Result<Uuid> {
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

/// Producer 1: for each top library artist, Last.fm's similar-artist list,
/// minus anything already in the library.
pub async fn similar_artists(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    top_artists: &[(Artist, f64)],
) -> Vec<RawCandidate> {
    let mut out = Vec::new();
    for (artist, _affinity) in top_artists.iter().take(5) {
        for similar in integrations.lastfm.similar_artists(&artist.name, 10).await {
            let existing = entities.artists.find_by_name(&similar.name).await.ok().flatten();
            if existing.as_ref().map(|a| a.in_library) == Some(true) {
                continue;
            }
            let audio_features = existing.as_ref().and_then(artist_features);
            let candidate_id = match upsert_candidate_artist(entities, &similar.name, &similar.genres).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, artist = %similar.name, "similar-artists: candidate upsert failed");
                    continue;
                }
            };
            out.push(RawCandidate {
                recommendation_type: RecommendationType::Artist,
                category: RecommendationCategory::SimilarArtists,
                artist_id: Some(candidate_id),
                album_id: None,
                basis_artist_id: Some(artist.id),
                candidate_genres: similar.genres,
                external_match: similar.match_score,
                audio_features,
                reason: format!("similar to {}, which you listen to often", artist.name),
            });
        }
    }
    out
}

/// Producer 2: artists from the catalog's genre lookup for each top taste
/// genre, minus anything already in the library.
pub async fn genre_explore(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    top_genres: &[(String, f64)],
) -> Vec<RawCandidate> {
    let mut out = Vec::new();
    for (genre, _affinity) in top_genres.iter().take(3) {
        let found = match deezer_genre_id(genre) {
            Some(genre_id) => integrations.deezer.genre_artists(genre_id, 10).await,
            None => integrations.spotify.search_artists(genre, 10).await,
        };

        for candidate in found {
            let existing = entities.artists.find_by_name(&candidate.name).await.ok().flatten();
            if existing.as_ref().map(|a| a.in_library) == Some(true) {
                continue;
            }
            let audio_features = existing.as_ref().and_then(artist_features);
            let mut genres = candidate.genres.clone();
            if genres.is_empty() {
                genres.push(genre.clone());
            }
            let candidate_id = match upsert_candidate_artist(entities, &candidate.name, &genres).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, artist = %candidate.name, "genre-explore: candidate upsert failed");
                    continue;
                }
            };
            out.push(RawCandidate {
                recommendation_type: RecommendationType::Artist,
                category: RecommendationCategory::GenreExplore,
                artist_id: Some(candidate_id),
                album_id: None,
                basis_artist_id: None,
                candidate_genres: genres,
                external_match: candidate.match_score,
                audio_features,
                reason: format!("you listen to a lot of {genre}"),
            });
        }
    }
    out
}

/// Producer 3: albums by top library artists that aren't in the library yet.
pub async fn deep_cuts(entities: &EntityStore, top_artists: &[(Artist, f64)]) -> Vec<RawCandidate> {
    let mut out = Vec::new();
    for (artist, _affinity) in top_artists.iter().take(5) {
        let albums = match entities.albums.list_for_artist(artist.id).await {
            Ok(albums) => albums,
            Err(e) => {
                warn!(error = %e, artist = %artist.name, "deep-cuts: could not list albums");
                continue;
            }
        };
        for album in albums.into_iter().filter(|a| !a.in_library) {
            out.push(RawCandidate {
                recommendation_type: RecommendationType::Album,
                category: RecommendationCategory::DeepCuts,
                artist_id: Some(artist.id),
                album_id: Some(album.id),
                basis_artist_id: Some(artist.id),
                candidate_genres: artist.genres.clone(),
                external_match: None,
                audio_features: artist_features(artist),
                reason: format!("deeper cut from {}", artist.name),
            });
        }
    }
    out
}

const MOODS: &[&str] = &["energetic", "chill", "focus"];

/// Producer 4: mood-keyword catalog search. There's no generic track-search
/// client, so albums stand in for tracks here.
pub async fn mood_based(entities: &EntityStore, integrations: &IntegrationRegistry) -> Vec<RawCandidate> {
    let mut out = Vec::new();
    for mood in MOODS {
        for album in integrations.deezer.search_albums(mood, 8).await {
            let artist_id = match upsert_candidate_artist(entities, &album.artist_name, &[]).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, artist = %album.artist_name, "mood-based: artist upsert failed");
                    continue;
                }
            };
            let saved = match entities
                .albums
                .upsert(artist_id, &album.title, AlbumType::Album, ReleaseType::Studio, album.release_date, None)
                .await
            {
                Ok(saved) => saved,
                Err(e) => {
                    warn!(error = %e, album = %album.title, "mood-based: album upsert failed");
                    continue;
                }
            };
            out.push(RawCandidate {
                recommendation_type: RecommendationType::Album,
                category: RecommendationCategory::MoodBased,
                artist_id: Some(artist_id),
                album_id: Some(saved.id),
                basis_artist_id: None,
                candidate_genres: vec![],
                external_match: None,
                audio_features: None, // Deezer's catalog search reports no per-track features
                reason: format!("matches your {mood} listening"),
            });
        }
    }
    out
}

/// Producer 5: similar artists to whoever was played most in the last 14
/// days, independent of the all-time affinity top artists.
pub async fn history_based(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    recent_artists: &[(Artist, f64)],
) -> Vec<RawCandidate> {
    let mut out = Vec::new();
    for (artist, _affinity) in recent_artists.iter().take(3) {
        for similar in integrations.lastfm.similar_artists(&artist.name, 5).await {
            let existing = entities.artists.find_by_name(&similar.name).await.ok().flatten();
            if existing.as_ref().map(|a| a.in_library) == Some(true) {
                continue;
            }
            let audio_features = existing.as_ref().and_then(artist_features);
            let candidate_id = match upsert_candidate_artist(entities, &similar.name, &similar.genres).await {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, artist = %similar.name, "history-based: candidate upsert failed");
                    continue;
                }
            };
            out.push(RawCandidate {
                recommendation_type: RecommendationType::Artist,
                category: RecommendationCategory::SimilarArtists,
                artist_id: Some(candidate_id),
                album_id: None,
                basis_artist_id: Some(artist.id),
                candidate_genres: similar.genres,
                external_match: similar.match_score,
                audio_features,
                reason: format!("trending in your recent plays, like {}", artist.name),
            });
        }
    }
    out
}
