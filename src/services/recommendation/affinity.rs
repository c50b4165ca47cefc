//! Time-decayed affinity: the first stage of recommendation generation.
//! Every play contributes a weight that decays with age and is discounted
//! for skips, then affinities are normalized to `[0, 1]` by their max.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::artist::Artist;
use crate::models::listening_event::ListeningEvent;

/// `w = exp(-ln2 * age_days / half_life_days)`.
pub fn decay_weight(age_days: f64, half_life_days: f64) -> f64 {
    (-std::f64::consts::LN_2 * age_days / half_life_days).exp()
}

/// Decay weight folded with completion and a skip discount.
pub fn play_weight(age_days: f64, half_life_days: f64, completion_percent: f64, skipped: bool) -> f64 {
    let decay = decay_weight(age_days, half_life_days);
    let completion = (completion_percent / 100.0).clamp(0.0, 1.0);
    let skip_factor = if skipped { 0.3 } else { 1.0 };
    decay * completion * skip_factor
}

fn normalize<K: std::hash::Hash + Eq>(sums: HashMap<K, f64>) -> HashMap<K, f64> {
    let max = sums.values().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return sums;
    }
    sums.into_iter().map(|(k, v)| (k, v / max)).collect()
}

/// Sums weighted plays per artist, normalized to `[0, 1]`.
pub fn artist_affinity(
    events: &[ListeningEvent],
    now: DateTime<Utc>,
    half_life_days: f64,
) -> HashMap<Uuid, f64> {
    let mut sums: HashMap<Uuid, f64> = HashMap::new();
    for event in events {
        let Some(artist_id) = event.artist_id else { continue };
        let weight = play_weight(event.age_days(now), half_life_days, event.completion_percent, event.skipped);
        *sums.entry(artist_id).or_insert(0.0) += weight;
    }
    normalize(sums)
}

/// Sums weighted plays per genre, attributing each play's weight to every
/// genre tag of the artist that was played.
pub fn genre_affinity(
    events: &[ListeningEvent],
    artists_by_id: &HashMap<Uuid, Artist>,
    now: DateTime<Utc>,
    half_life_days: f64,
) -> HashMap<String, f64> {
    let mut sums: HashMap<String, f64> = HashMap::new();
    for event in events {
        let Some(artist_id) = event.artist_id else { continue };
        let Some(artist) = artists_by_id.get(&artist_id) else { continue };
        let weight = play_weight(event.age_days(now), half_life_days, event.completion_percent, event.skipped);
        for genre in &artist.genres {
            *sums.entry(genre.clone()).or_insert(0.0) += weight;
        }
    }
    normalize(sums)
}

/// `min(unique_artists / (total_plays * 0.1 + 1), 1)`.
pub fn novelty_preference(unique_artists: usize, total_plays: usize) -> f64 {
    (unique_artists as f64 / (total_plays as f64 * 0.1 + 1.0)).min(1.0)
}

/// Sorts a normalized affinity map descending and takes the top `n` keys.
pub fn top_n<K: Clone>(map: &HashMap<K, f64>, n: usize) -> Vec<(K, f64)> {
    let mut entries: Vec<(K, f64)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    entries.truncate(n);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(artist_id: Uuid, played_at: DateTime<Utc>, completion: f64, skipped: bool) -> ListeningEvent {
        ListeningEvent {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            track_id: None,
            album_id: None,
            artist_id: Some(artist_id),
            media_server_track_key: None,
            played_at,
            play_duration_seconds: 180,
            track_duration_seconds: Some(200),
            completion_percent: completion,
            skipped,
            source: "plex".to_string(),
            device: None,
            player: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn recent_plays_outweigh_old_ones() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let events = vec![
            event(a, now - Duration::days(1), 100.0, false),
            event(b, now - Duration::days(60), 100.0, false),
        ];
        let affinity = artist_affinity(&events, now, 14.0);
        assert!(affinity[&a] > affinity[&b]);
    }

    #[test]
    fn skip_discounts_weight() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let played = event(a, now, 100.0, false);
        let skipped = event(a, now, 100.0, true);
        let played_weight = play_weight(played.age_days(now), 14.0, played.completion_percent, played.skipped);
        let skipped_weight = play_weight(skipped.age_days(now), 14.0, skipped.completion_percent, skipped.skipped);
        assert!(skipped_weight < played_weight);
    }

    #[test]
    fn affinity_normalizes_to_one() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let events = vec![event(a, now, 100.0, false), event(a, now, 100.0, false)];
        let affinity = artist_affinity(&events, now, 14.0);
        assert_eq!(affinity[&a], 1.0);
    }

    #[test]
    fn novelty_preference_caps_at_one() {
        assert_eq!(novelty_preference(50, 10), 1.0);
        assert!(novelty_preference(2, 100) < 0.5);
    }
}
