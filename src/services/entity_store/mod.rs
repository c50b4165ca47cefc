//! Abstract repository over the entities in the data model.
//!
//! Each submodule owns one entity's queries. `EntityStore` bundles them
//! behind a single cheaply-cloneable handle so handlers and services don't
//! thread individual repositories through their constructors.

pub mod album;
pub mod artist;
pub mod download;
pub mod listening_event;
pub mod preference;
pub mod quality_profile;
pub mod recommendation;
pub mod rule;
pub mod taste_profile;
pub mod track;
pub mod user;
pub mod wishlist;

use sqlx::PgPool;

pub use album::AlbumRepository;
pub use artist::ArtistRepository;
pub use download::DownloadRepository;
pub use listening_event::ListeningEventRepository;
pub use preference::PreferenceRepository;
pub use quality_profile::QualityProfileRepository;
pub use recommendation::RecommendationRepository;
pub use rule::RuleRepository;
pub use taste_profile::TasteProfileRepository;
pub use track::TrackRepository;
pub use user::UserRepository;
pub use wishlist::WishlistRepository;

#[derive(Clone)]
pub struct EntityStore {
    pub artists: ArtistRepository,
    pub albums: AlbumRepository,
    pub tracks: TrackRepository,
    pub listening_events: ListeningEventRepository,
    pub wishlist: WishlistRepository,
    pub downloads: DownloadRepository,
    pub recommendations: RecommendationRepository,
    pub taste_profiles: TasteProfileRepository,
    pub preferences: PreferenceRepository,
    pub quality_profiles: QualityProfileRepository,
    pub rules: RuleRepository,
    pub users: UserRepository,
}

impl EntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            artists: ArtistRepository::new(pool.clone()),
            albums: AlbumRepository::new(pool.clone()),
            tracks: TrackRepository::new(pool.clone()),
            listening_events: ListeningEventRepository::new(pool.clone()),
            wishlist: WishlistRepository::new(pool.clone()),
            downloads: DownloadRepository::new(pool.clone()),
            recommendations: RecommendationRepository::new(pool.clone()),
            taste_profiles: TasteProfileRepository::new(pool.clone()),
            preferences: PreferenceRepository::new(pool.clone()),
            quality_profiles: QualityProfileRepository::new(pool.clone()),
            rules: RuleRepository::new(pool.clone()),
            users: UserRepository::new(pool),
        }
    }
}
