//! Action execution: one `RuleAction` against one fired `RuleContext`.
//! Actions mutate declarative state (wishlist items, recommendations,
//! artist tags) and lean on the existing scheduled jobs to carry that state
//! to completion rather than reaching into the download pipeline directly.

use std::collections::HashSet;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::rule::{RuleAction, RuleActionKind};
use crate::models::wishlist::{CreateWishlistItemRequest, WishlistItemType, WishlistPriority, WishlistSource};
use crate::services::{EntityStore, IntegrationRegistry};

use super::RuleContext;

/// `Skip` halts the remaining actions of the firing rule; it does not touch
/// other rules evaluated for the same trigger.
pub enum Outcome {
    Continue,
    Skip,
}

fn parse_priority(value: Option<&str>) -> WishlistPriority {
    match value.map(|s| s.to_lowercase()) {
        Some(ref s) if s == "high" => WishlistPriority::High,
        Some(ref s) if s == "low" => WishlistPriority::Low,
        _ => WishlistPriority::Normal,
    }
}

/// `send_notification`'s `{field}`-style interpolation against the
/// evaluated context.
fn interpolate(template: &str, ctx: &RuleContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(end) = rest[start..].find('}') else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..start]);
        let key = &rest[start + 1..start + end];
        match ctx.fields.get(key) {
            Some(value) => out.push_str(&value.to_string().trim_matches('"').to_string()),
            None => out.push_str(&rest[start..start + end + 1]),
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);
    out
}

pub async fn execute(
    action: &RuleAction,
    ctx: &RuleContext,
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
) -> Result<Outcome> {
    match action.kind {
        RuleActionKind::AddToWishlist => add_to_wishlist(action, ctx, entities).await,
        RuleActionKind::StartDownload => start_download(action, ctx, entities).await,
        RuleActionKind::AddToPlaylist => add_to_playlist(action, ctx, entities).await,
        RuleActionKind::SendNotification => send_notification(action, ctx),
        RuleActionKind::TagItem => tag_item(action, ctx, entities).await,
        RuleActionKind::SetQualityProfile => set_quality_profile(action, ctx, entities).await,
        RuleActionKind::SkipItem => Ok(Outcome::Skip),
        RuleActionKind::AddToLibrary => add_to_library(ctx, entities).await,
        RuleActionKind::ImportPlaylistUrl => import_playlist_url(action, ctx, entities, integrations).await,
    }
}

async fn add_to_wishlist(action: &RuleAction, ctx: &RuleContext, entities: &EntityStore) -> Result<Outcome> {
    let priority = action.params.get("priority").and_then(|v| v.as_str());
    let auto_download = action.params.get("auto_download").and_then(|v| v.as_bool()).unwrap_or(false);

    let item_type = if ctx.album_id.is_some() {
        WishlistItemType::Album
    } else {
        WishlistItemType::Artist
    };

    entities
        .wishlist
        .create(
            ctx.user_id,
            CreateWishlistItemRequest {
                item_type,
                artist_id: ctx.artist_id,
                album_id: ctx.album_id,
                artist_name: ctx.fields.get("artist_name").and_then(|v| v.as_str()).map(str::to_string),
                album_title: ctx.fields.get("album_title").and_then(|v| v.as_str()).map(str::to_string),
                musicbrainz_id: None,
                spotify_id: None,
                priority: Some(parse_priority(priority)),
                source: WishlistSource::Automation,
                preferred_format: None,
                auto_download: Some(auto_download),
            },
        )
        .await?;
    Ok(Outcome::Continue)
}

async fn start_download(action: &RuleAction, ctx: &RuleContext, entities: &EntityStore) -> Result<Outcome> {
    let Some(item_id) = ctx.wishlist_item_id else {
        warn!("start_download: no wishlist item in context, skipping");
        return Ok(Outcome::Continue);
    };
    if let Some(format) = action.params.get("format").and_then(|v| v.as_str()) {
        entities.wishlist.set_preferred_format(item_id, format).await?;
    }
    entities.wishlist.set_auto_download(item_id, true).await?;
    entities.wishlist.revert_to_wanted(item_id).await?;
    Ok(Outcome::Continue)
}

async fn add_to_playlist(action: &RuleAction, ctx: &RuleContext, entities: &EntityStore) -> Result<Outcome> {
    let Some(recommendation_id) = ctx.recommendation_id else {
        warn!("add_to_playlist: no recommendation in context, skipping");
        return Ok(Outcome::Continue);
    };
    let playlist_id = action
        .params
        .get("playlist_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::invalid("rule_action", "add_to_playlist requires playlist_id"))?;
    entities.recommendations.set_playlist_group(recommendation_id, playlist_id).await?;
    Ok(Outcome::Continue)
}

fn send_notification(action: &RuleAction, ctx: &RuleContext) -> Result<Outcome> {
    let message = action
        .params
        .get("message")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::invalid("rule_action", "send_notification requires message"))?;
    info!(user_id = %ctx.user_id, message = %interpolate(message, ctx), "rule notification");
    Ok(Outcome::Continue)
}

async fn tag_item(action: &RuleAction, ctx: &RuleContext, entities: &EntityStore) -> Result<Outcome> {
    let Some(artist_id) = ctx.artist_id else {
        warn!("tag_item: no artist in context, skipping");
        return Ok(Outcome::Continue);
    };
    let new_tags: Vec<String> = action
        .params
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str()).map(str::to_string).collect())
        .unwrap_or_default();

    let artist = entities.artists.get(artist_id).await?;
    let mut tags = artist.tags;
    let mut seen: HashSet<String> = tags.iter().cloned().collect();
    for tag in new_tags {
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }
    entities.artists.set_tags(artist_id, &tags).await?;
    Ok(Outcome::Continue)
}

async fn set_quality_profile(action: &RuleAction, ctx: &RuleContext, entities: &EntityStore) -> Result<Outcome> {
    let Some(item_id) = ctx.wishlist_item_id else {
        warn!("set_quality_profile: no wishlist item in context, skipping");
        return Ok(Outcome::Continue);
    };
    let profile_name = action
        .params
        .get("profile_name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::invalid("rule_action", "set_quality_profile requires profile_name"))?;

    let profiles = entities.quality_profiles.list_for_user(ctx.user_id).await?;
    let Some(profile) = profiles.iter().find(|p| p.name.eq_ignore_ascii_case(profile_name)) else {
        warn!(profile = profile_name, "set_quality_profile: no profile with that name");
        return Ok(Outcome::Continue);
    };
    entities.wishlist.set_preferred_format(item_id, &profile.min_quality).await?;
    Ok(Outcome::Continue)
}

async fn add_to_library(ctx: &RuleContext, entities: &EntityStore) -> Result<Outcome> {
    let Some(item_id) = ctx.wishlist_item_id else {
        warn!("add_to_library: no wishlist item in context, skipping");
        return Ok(Outcome::Continue);
    };
    entities.wishlist.set_status(item_id, crate::models::wishlist::WishlistStatus::Downloaded).await?;
    Ok(Outcome::Continue)
}

async fn import_playlist_url(
    action: &RuleAction,
    ctx: &RuleContext,
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
) -> Result<Outcome> {
    let url = action
        .params
        .get("url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::invalid("rule_action", "import_playlist_url requires url"))?;
    let priority = parse_priority(action.params.get("priority").and_then(|v| v.as_str()));
    let auto_download = action.params.get("auto_download").and_then(|v| v.as_bool()).unwrap_or(false);

    let tracks = if url.contains("deezer.com") {
        integrations.deezer.resolve_playlist_url(url).await
    } else if url.contains("music.youtube.com") || url.contains("youtube.com") {
        integrations.youtube_music.resolve_playlist_url(url).await
    } else {
        warn!(url, "import_playlist_url: unrecognized playlist host");
        Vec::new()
    };

    if tracks.is_empty() {
        return Ok(Outcome::Continue);
    }

    let playlist_item = entities
        .wishlist
        .create(
            ctx.user_id,
            CreateWishlistItemRequest {
                item_type: WishlistItemType::Playlist,
                artist_id: None,
                album_id: None,
                artist_name: None,
                album_title: Some(url.to_string()),
                musicbrainz_id: None,
                spotify_id: None,
                priority: Some(priority),
                source: WishlistSource::Automation,
                preferred_format: None,
                auto_download: Some(auto_download),
            },
        )
        .await?;

    let mut seen: HashSet<(String, String)> = HashSet::new();
    for (artist_name, track_title) in tracks {
        let key = (artist_name.to_lowercase(), track_title.to_lowercase());
        if !seen.insert(key) {
            continue;
        }
        entities
            .wishlist
            .create(
                ctx.user_id,
                CreateWishlistItemRequest {
                    item_type: WishlistItemType::Track,
                    artist_id: None,
                    album_id: None,
                    artist_name: Some(artist_name),
                    album_title: Some(track_title),
                    musicbrainz_id: None,
                    spotify_id: None,
                    priority: Some(priority),
                    source: WishlistSource::Automation,
                    preferred_format: None,
                    auto_download: Some(auto_download),
                },
            )
            .await?;
    }

    info!(playlist_item_id = %playlist_item.id, url, "playlist import queued");
    Ok(Outcome::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn ctx() -> RuleContext {
        let mut fields = HashMap::new();
        fields.insert("artist_name".to_string(), json!("Boards of Canada"));
        RuleContext {
            user_id: Uuid::new_v4(),
            fields,
            artist_id: None,
            album_id: None,
            recommendation_id: None,
            wishlist_item_id: None,
        }
    }

    #[test]
    fn interpolate_substitutes_known_fields() {
        let message = interpolate("new music from {artist_name}", &ctx());
        assert_eq!(message, "new music from Boards of Canada");
    }

    #[test]
    fn interpolate_leaves_unknown_placeholders_untouched() {
        let message = interpolate("check out {unknown_field}", &ctx());
        assert_eq!(message, "check out {unknown_field}");
    }
}
