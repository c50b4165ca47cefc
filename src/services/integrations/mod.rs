//! External service clients: music catalogs, the media server, the indexer
//! aggregator, download clients, and the post-processor. Every client is
//! non-throwing by construction (see each module) except Plex's
//! `verify_token`, which must distinguish "no access" from "unreachable".

pub mod audiodb;
pub mod beets;
pub mod common;
pub mod deezer;
pub mod lastfm;
pub mod musicbrainz;
pub mod plex;
pub mod prowlarr;
pub mod qbittorrent;
pub mod rate_limit;
pub mod sabnzbd;
pub mod spotify;
pub mod youtube_music;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::recovery::CircuitBreaker;
use crate::services::settings::SettingsStore;

use audiodb::AudioDbClient;
use beets::BeetsClient;
use deezer::DeezerClient;
use lastfm::LastfmClient;
use musicbrainz::MusicBrainzClient;
use plex::PlexClient;
use prowlarr::ProwlarrClient;
use qbittorrent::QbittorrentClient;
use sabnzbd::SabnzbdClient;
use spotify::SpotifyClient;
use youtube_music::YoutubeMusicClient;

/// Every external client a running instance talks to, built once at startup
/// from settings and re-read on `settings:invalidate`. Clients that cache
/// mutable credentials (Spotify's token, qBittorrent's session cookie) are
/// rebuilt wholesale rather than patched in place.
#[derive(Clone)]
pub struct IntegrationRegistry {
    pub spotify: Arc<SpotifyClient>,
    pub lastfm: Arc<LastfmClient>,
    pub musicbrainz: Arc<MusicBrainzClient>,
    pub deezer: Arc<DeezerClient>,
    pub youtube_music: Arc<YoutubeMusicClient>,
    pub audiodb: Arc<AudioDbClient>,
    pub plex: Arc<PlexClient>,
    pub prowlarr: Arc<ProwlarrClient>,
    pub qbittorrent: Arc<QbittorrentClient>,
    pub sabnzbd: Arc<SabnzbdClient>,
    pub beets: Arc<BeetsClient>,
    breakers: Arc<RwLock<HashMap<String, CircuitBreaker>>>,
}

const BREAKER_FAILURE_THRESHOLD: u32 = 5;
const BREAKER_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

impl IntegrationRegistry {
    pub async fn from_settings(settings: &SettingsStore) -> Self {
        Self {
            spotify: Arc::new(SpotifyClient::new(
                settings.optional("spotify.client_id").await,
                settings.optional("spotify.client_secret").await,
            )),
            lastfm: Arc::new(LastfmClient::new(settings.optional("lastfm.api_key").await)),
            musicbrainz: Arc::new(MusicBrainzClient::new()),
            deezer: Arc::new(DeezerClient::new()),
            youtube_music: Arc::new(YoutubeMusicClient::new(
                settings.optional("youtube_music.api_key").await,
            )),
            audiodb: Arc::new(AudioDbClient::new(settings.optional("audiodb.api_key").await)),
            plex: Arc::new(PlexClient::new(
                settings.optional("plex.url").await,
                settings.optional("plex.token").await,
            )),
            prowlarr: Arc::new(ProwlarrClient::new(
                settings.optional("prowlarr.url").await,
                settings.optional("prowlarr.api_key").await,
            )),
            qbittorrent: Arc::new(QbittorrentClient::new(
                settings.optional("qbittorrent.url").await,
                settings.optional("qbittorrent.username").await,
                settings.optional("qbittorrent.password").await,
            )),
            sabnzbd: Arc::new(SabnzbdClient::new(
                settings.optional("sabnzbd.url").await,
                settings.optional("sabnzbd.api_key").await,
            )),
            beets: Arc::new(BeetsClient::new(
                settings.bool("beets.enabled", false).await,
                settings.optional("beets.config_path").await,
                settings.optional("beets.library_path").await,
            )),
            breakers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// `false` means the breaker is open for `service` and callers should
    /// skip the call entirely rather than let it fail again.
    pub async fn can_execute(&self, service: &str) -> bool {
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(service.to_string())
            .or_insert_with(|| CircuitBreaker::new(BREAKER_FAILURE_THRESHOLD, BREAKER_RECOVERY_TIMEOUT))
            .can_execute()
    }

    pub async fn record_success(&self, service: &str) {
        if let Some(breaker) = self.breakers.write().await.get_mut(service) {
            breaker.record_success();
        }
    }

    pub async fn record_failure(&self, service: &str) {
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(service.to_string())
            .or_insert_with(|| CircuitBreaker::new(BREAKER_FAILURE_THRESHOLD, BREAKER_RECOVERY_TIMEOUT))
            .record_failure();
    }
}
