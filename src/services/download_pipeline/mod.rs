//! The wishlist-to-library pipeline: search, grab, poll, import. Each stage
//! persists its transition before returning so a crash mid-pipeline leaves
//! the entity in a well-defined, resumable state.

pub mod grab;
pub mod import;
pub mod poll;
pub mod search;

use crate::error::Result;
use crate::models::download::Download;
use crate::models::wishlist::WishlistItem;
use crate::services::{EntityStore, Fanout, IntegrationRegistry, SettingsStore};

pub use search::score_release;

/// Entry point for the `process-wishlist` job: runs Search, then Grab if the
/// auto-download gate passes. Returns whether a download was actually grabbed.
pub async fn search_and_grab(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    fanout: &Fanout,
    item: &WishlistItem,
) -> Result<bool> {
    search::run(entities, integrations, settings, fanout, item, true).await
}

/// Entry point for user-triggered single-item search, which always grabs
/// regardless of the auto-download settings.
pub async fn search_and_grab_manual(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    fanout: &Fanout,
    item: &WishlistItem,
) -> Result<bool> {
    search::run(entities, integrations, settings, fanout, item, false).await
}

/// Entry point for the `check-download-status` job.
pub async fn poll_and_advance(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    settings: &SettingsStore,
    fanout: &Fanout,
    download: &Download,
) -> Result<()> {
    poll::run(entities, integrations, settings, fanout, download).await
}
