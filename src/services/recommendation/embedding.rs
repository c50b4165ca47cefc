//! The 8-dimensional taste embedding: feature vector, nearest-centroid
//! classification, and evolution-history drift.

use crate::models::taste_profile::{ClusterCentroid, TasteSnapshot};
use crate::models::track::AudioFeatures;

pub const DIMENSIONS: usize = 8;

/// `(bpm - 60) / 140`, clipped to `[0, 1]`.
pub fn normalize_tempo(bpm: f64) -> f64 {
    ((bpm - 60.0) / 140.0).clamp(0.0, 1.0)
}

/// Projects the 12-field `AudioFeatures` onto the 8 continuous dimensions
/// the embedding tracks (dropping key/mode/time_signature). Missing values
/// fall back to the midpoint rather than biasing the mean toward an extreme.
pub fn vector(features: &AudioFeatures) -> [f64; DIMENSIONS] {
    [
        features.danceability.unwrap_or(0.5),
        features.energy.unwrap_or(0.5),
        features.valence.unwrap_or(0.5),
        features.acousticness.unwrap_or(0.5),
        features.instrumentalness.unwrap_or(0.5),
        features.liveness.unwrap_or(0.5),
        features.speechiness.unwrap_or(0.5),
        features.tempo.map(normalize_tempo).unwrap_or(0.5),
    ]
}

pub fn to_audio_features(v: &[f64; DIMENSIONS]) -> AudioFeatures {
    AudioFeatures {
        danceability: Some(v[0]),
        energy: Some(v[1]),
        valence: Some(v[2]),
        acousticness: Some(v[3]),
        instrumentalness: Some(v[4]),
        liveness: Some(v[5]),
        speechiness: Some(v[6]),
        tempo: Some(60.0 + v[7] * 140.0),
        key: None,
        loudness: None,
        mode: None,
        time_signature: None,
    }
}

/// One track's contribution to the embedding: features, age in days,
/// completion percent, and whether it was skipped.
pub struct WeightedPlay {
    pub features: AudioFeatures,
    pub age_days: f64,
    pub completion_percent: f64,
    pub skipped: bool,
}

/// Weighted mean over recent plays. A skip repels rather than merely
/// discounts: its weight goes negative, pulling the mean away from that
/// track's features instead of just diluting the sample.
pub fn weighted_mean(plays: &[WeightedPlay], half_life_days: f64) -> ([f64; DIMENSIONS], f64) {
    let mut sum = [0.0_f64; DIMENSIONS];
    let mut total_weight = 0.0;

    for play in plays {
        let decay = super::affinity::decay_weight(play.age_days, half_life_days);
        let completion = (play.completion_percent / 100.0).clamp(0.0, 1.0);
        let weight = decay * completion * if play.skipped { -0.2 } else { 1.0 };
        let v = vector(&play.features);
        for i in 0..DIMENSIONS {
            sum[i] += v[i] * weight;
        }
        total_weight += weight;
    }

    if total_weight.abs() < f64::EPSILON {
        return ([0.5; DIMENSIONS], 0.0);
    }
    let mut mean = sum;
    for slot in mean.iter_mut() {
        *slot /= total_weight;
    }
    (mean, total_weight)
}

/// Eight archetypal listener profiles. Dimension order matches [`vector`]:
/// danceability, energy, valence, acousticness, instrumentalness, liveness,
/// speechiness, tempo.
pub fn cluster_centroids() -> Vec<ClusterCentroid> {
    let centroid = |name: &str, d: [f64; DIMENSIONS]| ClusterCentroid {
        name: name.to_string(),
        features: to_audio_features(&d),
    };
    vec![
        centroid("energetic_explorer", [0.75, 0.85, 0.70, 0.10, 0.05, 0.30, 0.10, 0.75]),
        centroid("chill_curator", [0.45, 0.25, 0.45, 0.65, 0.20, 0.15, 0.08, 0.30]),
        centroid("eclectic_audiophile", [0.50, 0.55, 0.50, 0.40, 0.30, 0.25, 0.15, 0.50]),
        centroid("rhythm_devotee", [0.85, 0.70, 0.60, 0.05, 0.10, 0.20, 0.20, 0.65]),
        centroid("melancholy_romantic", [0.35, 0.30, 0.20, 0.55, 0.10, 0.15, 0.08, 0.35]),
        centroid("instrumental_voyager", [0.40, 0.40, 0.45, 0.50, 0.75, 0.20, 0.03, 0.45]),
        centroid("indie_tastemaker", [0.55, 0.50, 0.50, 0.35, 0.15, 0.20, 0.12, 0.50]),
        centroid("high_fidelity_purist", [0.50, 0.45, 0.50, 0.60, 0.40, 0.30, 0.08, 0.45]),
    ]
}

fn euclidean_distance(a: &[f64; DIMENSIONS], b: &[f64; DIMENSIONS]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

/// Every centroid's distance-derived affinity (`1 - distance / sqrt(D)`,
/// floored at 0), keyed by centroid name.
pub fn cluster_affinities(embedding: &[f64; DIMENSIONS]) -> std::collections::HashMap<String, f64> {
    cluster_centroids()
        .iter()
        .map(|c| {
            let distance = euclidean_distance(embedding, &vector(&c.features));
            (c.name.clone(), (1.0 - distance / (DIMENSIONS as f64).sqrt()).max(0.0))
        })
        .collect()
}

/// Nearest centroid by Euclidean distance, with its affinity as confidence.
pub fn nearest_centroid(embedding: &[f64; DIMENSIONS]) -> (String, f64) {
    let affinities = cluster_affinities(embedding);
    affinities
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or_else(|| ("eclectic_audiophile".to_string(), 0.0))
}

/// Dimension names in the same order as [`vector`].
pub const FEATURE_NAMES: [&str; DIMENSIONS] = [
    "danceability",
    "energy",
    "valence",
    "acousticness",
    "instrumentalness",
    "liveness",
    "speechiness",
    "tempo",
];

/// Signed per-feature drift between two embeddings, keeping only dimensions
/// whose absolute delta is at least 0.05.
pub fn feature_deltas(previous: &[f64; DIMENSIONS], current: &[f64; DIMENSIONS]) -> std::collections::HashMap<String, f64> {
    FEATURE_NAMES
        .iter()
        .zip(previous.iter().zip(current.iter()))
        .filter_map(|(name, (prev, curr))| {
            let delta = curr - prev;
            (delta.abs() >= 0.05).then(|| (name.to_string(), delta))
        })
        .collect()
}

/// Similarity between a full embedding and a candidate's partial audio
/// features, averaged only over the dimensions the candidate actually
/// reports. `None` when the candidate carries no features at all.
pub fn partial_similarity(user: &[f64; DIMENSIONS], features: &AudioFeatures) -> Option<f64> {
    let present: Vec<(f64, f64)> = [
        features.danceability.map(|v| (user[0], v)),
        features.energy.map(|v| (user[1], v)),
        features.valence.map(|v| (user[2], v)),
        features.acousticness.map(|v| (user[3], v)),
        features.instrumentalness.map(|v| (user[4], v)),
        features.liveness.map(|v| (user[5], v)),
        features.speechiness.map(|v| (user[6], v)),
        features.tempo.map(|v| (user[7], normalize_tempo(v))),
    ]
    .into_iter()
    .flatten()
    .collect();

    if present.is_empty() {
        return None;
    }
    let mean_abs_diff = present.iter().map(|(a, b)| (a - b).abs()).sum::<f64>() / present.len() as f64;
    Some((1.0 - mean_abs_diff).max(0.0))
}

/// Average per-dimension absolute drift between consecutive snapshots.
/// Stable below 0.05, evolving below 0.15, shifting beyond.
pub fn evolution_trend(history: &[TasteSnapshot]) -> &'static str {
    if history.len() < 2 {
        return "stable";
    }
    let drifts: Vec<f64> = history
        .windows(2)
        .filter(|pair| pair[0].embedding.len() == DIMENSIONS && pair[1].embedding.len() == DIMENSIONS)
        .map(|pair| {
            pair[0]
                .embedding
                .iter()
                .zip(pair[1].embedding.iter())
                .map(|(x, y)| (x - y).abs())
                .sum::<f64>()
                / DIMENSIONS as f64
        })
        .collect();

    if drifts.is_empty() {
        return "stable";
    }
    let avg = drifts.iter().sum::<f64>() / drifts.len() as f64;
    if avg < 0.05 {
        "stable"
    } else if avg < 0.15 {
        "evolving"
    } else {
        "shifting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(danceability: f64, energy: f64, tempo: f64) -> AudioFeatures {
        AudioFeatures {
            danceability: Some(danceability),
            energy: Some(energy),
            valence: Some(0.5),
            acousticness: Some(0.5),
            instrumentalness: Some(0.5),
            liveness: Some(0.5),
            speechiness: Some(0.5),
            tempo: Some(tempo),
            key: None,
            loudness: None,
            mode: None,
            time_signature: None,
        }
    }

    #[test]
    fn tempo_normalization_clips_to_unit_range() {
        assert_eq!(normalize_tempo(60.0), 0.0);
        assert_eq!(normalize_tempo(200.0), 1.0);
        assert_eq!(normalize_tempo(300.0), 1.0);
    }

    #[test]
    fn energetic_play_nudges_embedding_toward_energetic_explorer() {
        let plays: Vec<WeightedPlay> = (0..5)
            .map(|_| WeightedPlay {
                features: features(0.8, 0.9, 140.0),
                age_days: 1.0,
                completion_percent: 100.0,
                skipped: false,
            })
            .collect();
        let (embedding, weight) = weighted_mean(&plays, 14.0);
        assert!(weight > 0.0);
        let (cluster, _) = nearest_centroid(&embedding);
        assert_eq!(cluster, "energetic_explorer");
    }

    #[test]
    fn skipped_tracks_repel_the_mean() {
        let liked = vec![WeightedPlay {
            features: features(0.5, 0.5, 120.0),
            age_days: 1.0,
            completion_percent: 100.0,
            skipped: false,
        }];
        let (without_skip, _) = weighted_mean(&liked, 14.0);

        let mut with_skip = liked;
        with_skip.push(WeightedPlay {
            features: features(0.9, 0.9, 180.0),
            age_days: 1.0,
            completion_percent: 0.0,
            skipped: true,
        });
        let (with_skip_embedding, _) = weighted_mean(&with_skip, 14.0);

        assert!(with_skip_embedding[0] < without_skip[0]);
    }

    #[test]
    fn no_history_is_stable() {
        assert_eq!(evolution_trend(&[]), "stable");
    }

    #[test]
    fn feature_deltas_ignores_small_moves_and_reports_sign() {
        let mut previous = [0.5; DIMENSIONS];
        let mut current = [0.5; DIMENSIONS];
        current[0] = 0.52; // below threshold
        current[1] = 0.65; // above threshold, up
        current[2] = 0.30; // above threshold, down
        previous[1] = 0.5;
        previous[2] = 0.5;

        let deltas = feature_deltas(&previous, &current);
        assert!(!deltas.contains_key("danceability"));
        assert!(deltas["energy"] > 0.0);
        assert!(deltas["valence"] < 0.0);
    }

    #[test]
    fn partial_similarity_is_none_with_no_reported_dimensions() {
        let user = [0.5; DIMENSIONS];
        assert!(partial_similarity(&user, &AudioFeatures::default()).is_none());
    }

    #[test]
    fn partial_similarity_rewards_closeness_on_reported_dims() {
        let user = [0.5; DIMENSIONS];
        let close = AudioFeatures { danceability: Some(0.5), ..features(0.5, 0.5, 130.0) };
        let far = AudioFeatures { danceability: Some(0.0), ..features(0.0, 0.0, 130.0) };
        let close_score = partial_similarity(&user, &close).unwrap();
        let far_score = partial_similarity(&user, &far).unwrap();
        assert!(close_score > far_score);
    }

    #[test]
    fn large_drift_is_shifting() {
        let snap = |embedding: Vec<f64>| TasteSnapshot {
            version: 1,
            captured_at: chrono::Utc::now(),
            top_genres: Default::default(),
            novelty_preference: 0.5,
            embedding,
            sample_size: 10,
        };
        let history = vec![snap(vec![0.1; DIMENSIONS]), snap(vec![0.9; DIMENSIONS])];
        assert_eq!(evolution_trend(&history), "shifting");
    }
}
