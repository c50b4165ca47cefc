use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::track::AudioFeatures;

/// A named centroid in the 12-dimensional audio feature space. Cluster
/// affinities are cosine similarities between a user's embedding and each
/// of the predefined centroids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterCentroid {
    pub name: String,
    pub features: AudioFeatures,
}

/// The nearest cluster centroid at the time of a profile recompute, with its
/// distance-derived confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub name: String,
    pub confidence: f64,
}

/// Drift classification since the previous snapshot, plus the per-feature
/// signed deltas that cleared the 0.05 reporting threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasteTrend {
    pub label: String,
    pub feature_deltas: HashMap<String, f64>,
}

/// One monthly entry in a taste profile's evolution history. At most the
/// last 12 are retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasteSnapshot {
    pub version: i32,
    pub captured_at: DateTime<Utc>,
    pub top_genres: HashMap<String, f64>,
    pub novelty_preference: f64,
    pub embedding: Vec<f64>,
    pub sample_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TasteProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub version: i32,

    pub top_genres: serde_json::Value,
    pub preferred_decades: serde_json::Value,

    pub mean_danceability: Option<f64>,
    pub mean_energy: Option<f64>,
    pub mean_valence: Option<f64>,
    pub mean_tempo: Option<f64>,

    pub total_plays: i64,
    pub total_artists: i64,
    pub total_albums: i64,
    pub total_tracks: i64,

    pub peak_hours: Vec<i32>,
    pub peak_days: Vec<i32>,

    pub novelty_preference: f64,

    /// Opaque profile data: the 12-dim ML embedding, cluster affinities, and
    /// the evolution history (see `evolution_history`).
    pub profile_data: serde_json::Value,

    pub computed_at: DateTime<Utc>,
}

impl TasteProfile {
    pub fn top_genre_map(&self) -> HashMap<String, f64> {
        serde_json::from_value(self.top_genres.clone()).unwrap_or_default()
    }

    pub fn preferred_decade_map(&self) -> HashMap<String, f64> {
        serde_json::from_value(self.preferred_decades.clone()).unwrap_or_default()
    }

    pub fn embedding(&self) -> AudioFeatures {
        self.profile_data
            .get("embedding")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn cluster_affinities(&self) -> HashMap<String, f64> {
        self.profile_data
            .get("cluster_affinities")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn evolution_history(&self) -> Vec<TasteSnapshot> {
        self.profile_data
            .get("evolution_history")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn cluster(&self) -> Option<ClusterAssignment> {
        self.profile_data.get("cluster").cloned().and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn trend(&self) -> Option<TasteTrend> {
        self.profile_data.get("trend").cloned().and_then(|v| serde_json::from_value(v).ok())
    }

    /// Appends `snapshot`, keeping at most the last 12 monthly entries.
    pub fn with_snapshot_appended(mut self, snapshot: TasteSnapshot) -> Self {
        let mut history = self.evolution_history();
        history.push(snapshot);
        if history.len() > 12 {
            let drop = history.len() - 12;
            history.drain(0..drop);
        }
        if let Some(obj) = self.profile_data.as_object_mut() {
            obj.insert(
                "evolution_history".to_string(),
                serde_json::to_value(history).unwrap_or(serde_json::Value::Null),
            );
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_profile() -> TasteProfile {
        TasteProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            version: 1,
            top_genres: serde_json::json!({}),
            preferred_decades: serde_json::json!({}),
            mean_danceability: None,
            mean_energy: None,
            mean_valence: None,
            mean_tempo: None,
            total_plays: 0,
            total_artists: 0,
            total_albums: 0,
            total_tracks: 0,
            peak_hours: vec![],
            peak_days: vec![],
            novelty_preference: 0.5,
            profile_data: serde_json::json!({}),
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn evolution_history_caps_at_twelve() {
        let mut profile = empty_profile();
        for v in 1..=15 {
            profile = profile.with_snapshot_appended(TasteSnapshot {
                version: v,
                captured_at: Utc::now(),
                top_genres: HashMap::new(),
                novelty_preference: 0.5,
                embedding: vec![0.5; 8],
                sample_size: 10,
            });
        }
        assert_eq!(profile.evolution_history().len(), 12);
        assert_eq!(profile.evolution_history().first().unwrap().version, 4);
    }
}
