//! Normalized shapes music-catalog clients return. Each client maps its own
//! wire format onto these before handing results back, so the rest of the
//! system (recommendation engine, scheduler jobs) never branches on source.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogArtist {
    pub external_id: String,
    pub name: String,
    pub genres: Vec<String>,
    pub popularity: Option<i32>,
    pub image_url: Option<String>,
    /// Source-reported similarity to the artist the lookup was seeded from
    /// (e.g. Last.fm's `match`), when the client surfaces one.
    pub match_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogAlbum {
    pub external_id: String,
    pub title: String,
    pub artist_name: String,
    pub release_date: Option<NaiveDate>,
    pub total_tracks: Option<i32>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogTrack {
    pub external_id: String,
    pub title: String,
    pub artist_name: String,
    pub album_title: Option<String>,
    pub duration_seconds: Option<i32>,
}

/// Lowercases, strips bracketed/parenthesized tags and punctuation, and
/// collapses whitespace. Shared by the Prowlarr release-title scorer and
/// qBittorrent's guid-to-hash identity bridge so both sides of that bridge
/// agree on what "the same release" looks like.
pub fn normalize_release_title(title: &str) -> String {
    let mut cleaned = String::with_capacity(title.len());
    let mut depth = 0i32;
    for c in title.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = (depth - 1).max(0),
            _ if depth > 0 => {}
            c if c.is_alphanumeric() => cleaned.push(c.to_ascii_lowercase()),
            _ => cleaned.push(' '),
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bracketed_tags_and_punctuation() {
        assert_eq!(
            normalize_release_title("The Weeknd - Dawn FM [FLAC] (2022)"),
            "the weeknd dawn fm"
        );
    }

    #[test]
    fn collapses_repeated_whitespace() {
        assert_eq!(normalize_release_title("Dawn   FM"), "dawn fm");
    }
}
