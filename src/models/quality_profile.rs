use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::album::ReleaseType;

/// Ordered quality tiers a `QualityProfile.preferred_formats` list draws
/// from, best first.
pub const KNOWN_FORMATS: &[&str] = &["flac-24", "flac", "320", "v0", "256", "192", "mp3"];

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QualityProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,

    pub preferred_formats: Vec<String>,
    pub min_quality: String,
    pub max_size_mb: Option<i32>,
    pub min_seeders: i32,
    pub release_type_preference: Vec<ReleaseType>,

    pub format_match_weight: f64,
    pub seeder_weight: f64,

    pub is_default: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QualityProfile {
    pub fn accepts_format(&self, format: &str) -> bool {
        self.preferred_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(format))
    }

    /// Index of `format` within `preferred_formats`, best (lowest index)
    /// first; `None` if the format isn't listed at all.
    pub fn format_rank(&self, format: &str) -> Option<usize> {
        self.preferred_formats
            .iter()
            .position(|f| f.eq_ignore_ascii_case(format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> QualityProfile {
        QualityProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "default".to_string(),
            preferred_formats: vec!["flac".to_string(), "320".to_string()],
            min_quality: "320".to_string(),
            max_size_mb: None,
            min_seeders: 1,
            release_type_preference: vec![ReleaseType::Studio],
            format_match_weight: 0.6,
            seeder_weight: 0.4,
            is_default: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn format_rank_prefers_earlier_entries() {
        let p = profile();
        assert_eq!(p.format_rank("flac"), Some(0));
        assert_eq!(p.format_rank("320"), Some(1));
        assert_eq!(p.format_rank("mp3"), None);
    }
}
