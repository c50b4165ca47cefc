//! Weighted multi-factor scoring: turns a `RawCandidate` plus the taste
//! signals gathered alongside it into a `ScoredCandidate`. A factor that
//! has no input simply drops its weight from the denominator rather than
//! counting as zero.

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::recommendation::ScoredCandidate;

use super::candidates::RawCandidate;
use super::embedding::{self, DIMENSIONS};

const WEIGHT_GENRE_AFFINITY: f64 = 0.25;
const WEIGHT_SOURCE_ARTIST_AFFINITY: f64 = 0.20;
const WEIGHT_EXTERNAL_SIMILARITY: f64 = 0.20;
const WEIGHT_AUDIO_SIMILARITY: f64 = 0.15;
const WEIGHT_NOVELTY: f64 = 0.10;
const WEIGHT_FEEDBACK: f64 = 0.10;

/// The taste signals a candidate is scored against; gathered once per run
/// and shared across every candidate.
pub struct ScoringContext<'a> {
    pub genre_affinity: &'a HashMap<String, f64>,
    pub artist_affinity: &'a HashMap<Uuid, f64>,
    pub known_artist_ids: &'a std::collections::HashSet<Uuid>,
    pub novelty_preference: f64,
    pub category_feedback: &'a HashMap<String, f64>,
    /// The user's current taste embedding, when one has been computed yet.
    pub user_embedding: Option<[f64; DIMENSIONS]>,
}

fn mean_genre_affinity(genres: &[String], affinity: &HashMap<String, f64>) -> Option<f64> {
    if genres.is_empty() {
        return None;
    }
    let values: Vec<f64> = genres.iter().filter_map(|g| affinity.get(g).copied()).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn novelty_factor(artist_id: Option<Uuid>, ctx: &ScoringContext) -> f64 {
    let base = match artist_id {
        Some(id) if ctx.known_artist_ids.contains(&id) => 0.3,
        _ => 0.8,
    };
    (base + ctx.novelty_preference) / 2.0
}

/// Weighted average of whichever factors are present; returns the
/// confidence score plus the named factor map for storage/explanation.
pub fn score(candidate: &RawCandidate, ctx: &ScoringContext) -> (f64, HashMap<String, f64>) {
    let genre = mean_genre_affinity(&candidate.candidate_genres, ctx.genre_affinity);
    let source_artist = candidate.basis_artist_id.and_then(|id| ctx.artist_affinity.get(&id).copied());
    let external = candidate.external_match;
    let audio = candidate
        .audio_features
        .as_ref()
        .zip(ctx.user_embedding.as_ref())
        .and_then(|(features, user)| embedding::partial_similarity(user, features));
    let novelty = Some(novelty_factor(candidate.artist_id, ctx));
    let feedback = ctx.category_feedback.get(category_key(candidate)).copied();

    let weighted = [
        ("genre_affinity", WEIGHT_GENRE_AFFINITY, genre),
        ("source_artist_affinity", WEIGHT_SOURCE_ARTIST_AFFINITY, source_artist),
        ("external_similarity", WEIGHT_EXTERNAL_SIMILARITY, external),
        ("audio_feature_similarity", WEIGHT_AUDIO_SIMILARITY, audio),
        ("novelty", WEIGHT_NOVELTY, novelty),
        ("feedback", WEIGHT_FEEDBACK, feedback),
    ];

    let mut factors = HashMap::new();
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (name, weight, value) in weighted {
        if let Some(v) = value {
            factors.insert(name.to_string(), v);
            weighted_sum += weight * v;
            weight_total += weight;
        }
    }

    let confidence = if weight_total > 0.0 { weighted_sum / weight_total } else { 0.0 };
    (confidence, factors)
}

fn category_key(candidate: &RawCandidate) -> &'static str {
    use crate::models::recommendation::RecommendationCategory::*;
    match candidate.category {
        DiscoverWeekly => "discover_weekly",
        ReleaseRadar => "release_radar",
        SimilarArtists => "similar_artists",
        DeepCuts => "deep_cuts",
        GenreExplore => "genre_explore",
        MoodBased => "mood_based",
    }
}

pub fn into_scored(candidate: RawCandidate, confidence: f64, factors: HashMap<String, f64>) -> ScoredCandidate {
    let novelty = factors.get("novelty").copied().unwrap_or(0.5);
    ScoredCandidate {
        recommendation_type: candidate.recommendation_type,
        category: candidate.category,
        artist_id: candidate.artist_id,
        album_id: candidate.album_id,
        track_id: None,
        basis_artist_id: candidate.basis_artist_id,
        basis_album_id: None,
        reason: candidate.reason,
        reason_bullets: vec![],
        confidence,
        relevance: confidence,
        novelty,
        factors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recommendation::{RecommendationCategory, RecommendationType};

    fn raw(genres: Vec<String>, basis: Option<Uuid>, external: Option<f64>) -> RawCandidate {
        RawCandidate {
            recommendation_type: RecommendationType::Artist,
            category: RecommendationCategory::SimilarArtists,
            artist_id: Some(Uuid::new_v4()),
            album_id: None,
            basis_artist_id: basis,
            candidate_genres: genres,
            external_match: external,
            audio_features: None,
            reason: "test".to_string(),
        }
    }

    #[test]
    fn absent_factors_drop_out_of_denominator() {
        let genre_affinity = HashMap::new();
        let artist_affinity = HashMap::new();
        let known = std::collections::HashSet::new();
        let feedback = HashMap::new();
        let ctx = ScoringContext {
            genre_affinity: &genre_affinity,
            artist_affinity: &artist_affinity,
            known_artist_ids: &known,
            novelty_preference: 0.5,
            category_feedback: &feedback,
            user_embedding: None,
        };
        let candidate = raw(vec![], None, None);
        let (confidence, factors) = score(&candidate, &ctx);
        assert!(!factors.contains_key("genre_affinity"));
        assert!(!factors.contains_key("source_artist_affinity"));
        assert!(!factors.contains_key("external_similarity"));
        assert!(!factors.contains_key("audio_feature_similarity"));
        assert!(factors.contains_key("novelty"));
        assert!(confidence > 0.0);
    }

    #[test]
    fn high_external_match_raises_confidence() {
        let genre_affinity = HashMap::new();
        let artist_affinity = HashMap::new();
        let known = std::collections::HashSet::new();
        let feedback = HashMap::new();
        let ctx = ScoringContext {
            genre_affinity: &genre_affinity,
            artist_affinity: &artist_affinity,
            known_artist_ids: &known,
            novelty_preference: 0.5,
            category_feedback: &feedback,
            user_embedding: None,
        };
        let low = raw(vec![], None, Some(0.1));
        let high = raw(vec![], None, Some(0.95));
        let (low_score, _) = score(&low, &ctx);
        let (high_score, _) = score(&high, &ctx);
        assert!(high_score > low_score);
    }

    #[test]
    fn audio_similarity_is_scored_when_both_sides_have_features() {
        let genre_affinity = HashMap::new();
        let artist_affinity = HashMap::new();
        let known = std::collections::HashSet::new();
        let feedback = HashMap::new();
        let ctx = ScoringContext {
            genre_affinity: &genre_affinity,
            artist_affinity: &artist_affinity,
            known_artist_ids: &known,
            novelty_preference: 0.5,
            category_feedback: &feedback,
            user_embedding: Some([0.5; DIMENSIONS]),
        };
        let mut candidate = raw(vec![], None, None);
        candidate.audio_features = Some(crate::models::track::AudioFeatures {
            danceability: Some(0.5),
            energy: Some(0.5),
            ..Default::default()
        });
        let (_, factors) = score(&candidate, &ctx);
        assert!(factors.contains_key("audio_feature_similarity"));
        assert!(factors["audio_feature_similarity"] > 0.9);
    }
}
