use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PreferenceKind {
    GenreAffinity,
    DecadeAffinity,
    AudioFeatureTarget,
    ArtistAffinity,
    TimeWindow,
}

/// One typed sparse preference row. `key` disambiguates within a kind
/// (genre name, decade, feature name, artist id as string, or a time-window
/// label); `value` and `weight` are interpreted according to `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserPreference {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: PreferenceKind,
    pub key: String,
    pub value: f64,
    pub weight: f64,
    pub confidence: f64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
