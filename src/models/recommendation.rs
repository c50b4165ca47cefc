use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Artist,
    Album,
    Track,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    DiscoverWeekly,
    ReleaseRadar,
    SimilarArtists,
    DeepCuts,
    GenreExplore,
    MoodBased,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recommendation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recommendation_type: RecommendationType,
    pub category: RecommendationCategory,

    pub artist_id: Option<Uuid>,
    pub album_id: Option<Uuid>,
    pub track_id: Option<Uuid>,

    pub basis_artist_id: Option<Uuid>,
    pub basis_album_id: Option<Uuid>,

    pub reason: String,
    pub reason_bullets: Vec<String>,

    pub confidence: f64,
    pub relevance: f64,
    pub novelty: f64,

    pub factors: serde_json::Value,

    pub shown_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub added_to_wishlist_at: Option<DateTime<Utc>>,

    pub playlist_group: Option<String>,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now && self.dismissed_at.is_none()
    }

    pub fn factor_map(&self) -> HashMap<String, f64> {
        serde_json::from_value(self.factors.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub recommendation_type: RecommendationType,
    pub category: RecommendationCategory,
    pub artist_id: Option<Uuid>,
    pub album_id: Option<Uuid>,
    pub track_id: Option<Uuid>,
    pub basis_artist_id: Option<Uuid>,
    pub basis_album_id: Option<Uuid>,
    pub reason: String,
    pub reason_bullets: Vec<String>,
    pub confidence: f64,
    pub relevance: f64,
    pub novelty: f64,
    pub factors: HashMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(expires_at: DateTime<Utc>, dismissed_at: Option<DateTime<Utc>>) -> Recommendation {
        Recommendation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            recommendation_type: RecommendationType::Album,
            category: RecommendationCategory::DiscoverWeekly,
            artist_id: None,
            album_id: None,
            track_id: None,
            basis_artist_id: None,
            basis_album_id: None,
            reason: "similar to artists you play often".to_string(),
            reason_bullets: vec![],
            confidence: 0.8,
            relevance: 0.7,
            novelty: 0.5,
            factors: serde_json::json!({}),
            shown_at: None,
            clicked_at: None,
            dismissed_at,
            added_to_wishlist_at: None,
            playlist_group: None,
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn expired_or_dismissed_is_not_active() {
        let now = Utc::now();
        assert!(!sample(now - Duration::days(1), None).is_active(now));
        assert!(!sample(now + Duration::days(1), Some(now)).is_active(now));
        assert!(sample(now + Duration::days(1), None).is_active(now));
    }
}
