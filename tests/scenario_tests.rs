//! End-to-end scenario coverage for the pure, DB-free slice of each
//! documented scenario. Database- and integration-backed orchestration
//! (search → grab → poll → import, startup retry against a real pool,
//! registration against a real user table) is exercised by the colocated
//! `#[cfg(test)]` suites next to the code that drives it; these tests cover
//! the decision logic each scenario is actually asserting on.

use std::time::Duration;

use uuid::Uuid;

use vibarr::database::backoff_delay;
use vibarr::models::download::DownloadStatus;
use vibarr::models::recommendation::{RecommendationCategory, RecommendationType, ScoredCandidate};
use vibarr::models::wishlist::WishlistStatus;
use vibarr::services::auth::enforce_registration_policy;
use vibarr::services::download_pipeline::search::score_release;
use vibarr::services::entity_store::download::shadow_wishlist_status;
use vibarr::services::integrations::prowlarr::{Protocol, ReleaseRecord};
use vibarr::services::recommendation::diversify::diversify;

fn release(title: &str, seeders: Option<i32>, size_bytes: i64) -> ReleaseRecord {
    ReleaseRecord {
        guid: "guid".to_string(),
        indexer_id: 7,
        title: title.to_string(),
        size_bytes,
        seeders,
        leechers: None,
        protocol: Protocol::Torrent,
        download_url: "https://example.test/dl".to_string(),
        info_url: None,
        publish_date: chrono::Utc::now(),
        categories: vec![3000],
    }
}

/// S1 — the wishlist status a download drives it through, end to end, matches
/// `wanted -> searching -> found -> downloading -> importing -> downloaded`.
#[test]
fn s1_wishlist_tracks_download_through_full_lifecycle() {
    let sequence = [
        DownloadStatus::Pending,
        DownloadStatus::Searching,
        DownloadStatus::Found,
        DownloadStatus::Downloading,
        DownloadStatus::Importing,
        DownloadStatus::Completed,
    ];
    let shadowed: Vec<WishlistStatus> = sequence.into_iter().map(shadow_wishlist_status).collect();
    assert_eq!(
        shadowed,
        vec![
            WishlistStatus::Searching,
            WishlistStatus::Searching,
            WishlistStatus::Found,
            WishlistStatus::Downloading,
            WishlistStatus::Importing,
            WishlistStatus::Downloaded,
        ]
    );
}

/// S2 — a high-seed release for the wrong album never outranks a correct,
/// low-seed one once the text-relevance gate and sort order are applied.
#[test]
fn s2_search_ranks_relevant_match_over_high_seed_mismatch() {
    let wrong_album = release("Loose Sampler FLAC", Some(200), 600 * 1024 * 1024);
    let right_album = release("The Weeknd - Dawn FM 320", Some(30), 120 * 1024 * 1024);

    let (wrong_score, wrong_passes) = score_release(&wrong_album, "The Weeknd", "Dawn FM", "flac");
    let (right_score, right_passes) = score_release(&right_album, "The Weeknd", "Dawn FM", "flac");

    assert!(!wrong_passes);
    assert!(right_passes);

    let mut results = vec![(wrong_album.title.clone(), wrong_score, wrong_passes), (right_album.title.clone(), right_score, right_passes)];
    results.sort_by(|a, b| b.2.cmp(&a.2).then(b.1.partial_cmp(&a.1).unwrap()));

    assert_eq!(results[0].0, "The Weeknd - Dawn FM 320");
}

/// S3 — the documented retry backoff doubles from 1s and never exceeds 60s,
/// so a 29-failure startup probe sleeps `1s, 2s, 4s, ..., 60s, ...` before
/// succeeding on the 30th attempt.
#[test]
fn s3_backoff_sequence_doubles_and_caps_at_sixty_seconds() {
    let delays: Vec<Duration> = (1..=8).map(backoff_delay).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
            Duration::from_secs(16),
            Duration::from_secs(32),
            Duration::from_secs(60),
            Duration::from_secs(60),
        ]
    );
}

/// S4 — registration is gated by `registration_enabled` (checked before any
/// database access) and, once enabled, by the `max_users` capacity.
#[test]
fn s4_registration_policy_rejects_at_capacity_not_before() {
    assert!(enforce_registration_policy(2, 0).is_ok());
    assert!(enforce_registration_policy(2, 1).is_ok());

    let err = enforce_registration_policy(2, 2).unwrap_err();
    assert!(format!("{err}").contains("maximum user limit"));
}

fn candidate(basis_artist_id: Option<Uuid>, category: RecommendationCategory, confidence: f64) -> ScoredCandidate {
    ScoredCandidate {
        recommendation_type: RecommendationType::Artist,
        category,
        artist_id: Some(Uuid::new_v4()),
        album_id: None,
        track_id: None,
        basis_artist_id,
        basis_album_id: None,
        reason: "similar to a top artist".to_string(),
        reason_bullets: vec![],
        confidence,
        relevance: confidence,
        novelty: 0.5,
        factors: Default::default(),
    }
}

/// S5 — four candidates sharing one basis artist go in with confidences
/// `{0.92, 0.85, 0.81, 0.70}`; diversification's per-artist cap of 3 drops
/// exactly the weakest one and keeps the rest ordered by confidence.
#[test]
fn s5_diversification_caps_shared_basis_artist_at_three() {
    let basis = Uuid::new_v4();
    let candidates = vec![
        candidate(Some(basis), RecommendationCategory::SimilarArtists, 0.92),
        candidate(Some(basis), RecommendationCategory::SimilarArtists, 0.85),
        candidate(Some(basis), RecommendationCategory::SimilarArtists, 0.81),
        candidate(Some(basis), RecommendationCategory::SimilarArtists, 0.70),
    ];

    let result = diversify(candidates);

    assert_eq!(result.len(), 3);
    assert!(result.iter().all(|c| c.confidence >= 0.81));
    assert!(result.windows(2).all(|pair| pair[0].confidence >= pair[1].confidence));
}
