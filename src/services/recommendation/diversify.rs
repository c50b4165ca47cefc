//! Diversification: no single source artist or category may dominate the
//! final list. Runs after scoring, before persistence.

use std::cmp::Ordering;
use std::collections::HashMap;

use uuid::Uuid;

use crate::models::recommendation::{RecommendationCategory, ScoredCandidate};

const MAX_PER_ARTIST: usize = 3;
const MAX_PER_CATEGORY: usize = 15;

fn by_confidence_desc(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal)
}

/// Caps per basis artist, then per category, then sorts by confidence.
/// Candidates with no basis artist always survive the first pass.
pub fn diversify(candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    let mut by_artist: HashMap<Uuid, Vec<ScoredCandidate>> = HashMap::new();
    let mut no_basis: Vec<ScoredCandidate> = Vec::new();
    for candidate in candidates {
        match candidate.basis_artist_id {
            Some(id) => by_artist.entry(id).or_default().push(candidate),
            None => no_basis.push(candidate),
        }
    }

    let mut capped_by_artist = no_basis;
    for (_, mut group) in by_artist {
        group.sort_by(by_confidence_desc);
        group.truncate(MAX_PER_ARTIST);
        capped_by_artist.extend(group);
    }

    let mut by_category: HashMap<RecommendationCategory, Vec<ScoredCandidate>> = HashMap::new();
    for candidate in capped_by_artist {
        by_category.entry(candidate.category).or_default().push(candidate);
    }

    let mut result = Vec::new();
    for (_, mut group) in by_category {
        group.sort_by(by_confidence_desc);
        group.truncate(MAX_PER_CATEGORY);
        result.extend(group);
    }

    result.sort_by(by_confidence_desc);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recommendation::RecommendationType;

    fn candidate(basis: Option<Uuid>, category: RecommendationCategory, confidence: f64) -> ScoredCandidate {
        ScoredCandidate {
            recommendation_type: RecommendationType::Artist,
            category,
            artist_id: Some(Uuid::new_v4()),
            album_id: None,
            track_id: None,
            basis_artist_id: basis,
            basis_album_id: None,
            reason: "test".to_string(),
            reason_bullets: vec![],
            confidence,
            relevance: confidence,
            novelty: 0.5,
            factors: Default::default(),
        }
    }

    #[test]
    fn caps_candidates_per_basis_artist() {
        let artist = Uuid::new_v4();
        let candidates: Vec<ScoredCandidate> = (0..5)
            .map(|i| candidate(Some(artist), RecommendationCategory::SimilarArtists, 1.0 - i as f64 * 0.1))
            .collect();
        let result = diversify(candidates);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn candidates_without_basis_always_survive_artist_cap() {
        let candidates: Vec<ScoredCandidate> = (0..10)
            .map(|_| candidate(None, RecommendationCategory::MoodBased, 0.5))
            .collect();
        let result = diversify(candidates);
        assert_eq!(result.len(), 10);
    }

    #[test]
    fn caps_candidates_per_category() {
        let candidates: Vec<ScoredCandidate> = (0..20)
            .map(|i| candidate(Some(Uuid::new_v4()), RecommendationCategory::GenreExplore, 1.0 - i as f64 * 0.01))
            .collect();
        let result = diversify(candidates);
        assert_eq!(result.len(), 15);
    }

    #[test]
    fn result_is_sorted_by_confidence_descending() {
        let candidates = vec![
            candidate(None, RecommendationCategory::MoodBased, 0.2),
            candidate(None, RecommendationCategory::MoodBased, 0.9),
            candidate(None, RecommendationCategory::MoodBased, 0.5),
        ];
        let result = diversify(candidates);
        assert!(result[0].confidence >= result[1].confidence);
        assert!(result[1].confidence >= result[2].confidence);
    }
}
