use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Artist {
    pub id: Uuid,
    pub name: String,
    pub sort_name: Option<String>,
    pub disambiguation: Option<String>,

    pub musicbrainz_id: Option<String>,
    pub spotify_id: Option<String>,
    pub discogs_id: Option<String>,
    pub lastfm_url: Option<String>,

    pub biography: Option<String>,
    pub country: Option<String>,
    pub formed_year: Option<i32>,
    pub disbanded_year: Option<i32>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,

    pub mean_danceability: Option<f64>,
    pub mean_energy: Option<f64>,
    pub mean_valence: Option<f64>,
    pub mean_tempo: Option<f64>,

    pub spotify_popularity: Option<i32>,
    pub lastfm_listeners: Option<i64>,
    pub lastfm_playcount: Option<i64>,

    pub in_library: bool,
    pub media_server_key: Option<String>,

    pub image_urls: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArtistRequest {
    pub name: String,
    pub sort_name: Option<String>,
    pub musicbrainz_id: Option<String>,
    pub spotify_id: Option<String>,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistSummary {
    pub id: Uuid,
    pub name: String,
    pub genres: Vec<String>,
    pub in_library: bool,
    pub image_url: Option<String>,
}

impl From<Artist> for ArtistSummary {
    fn from(a: Artist) -> Self {
        Self {
            id: a.id,
            name: a.name,
            genres: a.genres,
            in_library: a.in_library,
            image_url: a.image_urls.into_iter().next(),
        }
    }
}
