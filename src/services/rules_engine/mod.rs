//! Rules engine (§4.G): `(trigger, conditions[], actions[], priority,
//! enabled)`. Conditions are AND-joined; actions run sequentially and
//! independently per matching rule — one rule's `skip_item` only halts
//! that rule's own remaining actions.

mod action;
mod condition;

use std::collections::HashMap;

use chrono::{Datelike, Timelike, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::rule::{AutomationRule, RuleTrigger};
use crate::services::scheduler::JobOutcome;
use crate::services::{EntityStore, IntegrationRegistry};

/// The fields and referenced entities a trigger exposes to its rules.
/// Trigger sites populate whichever of these apply; everything else stays
/// `None` / empty and conditions referencing it evaluate per the
/// missing-field rule.
pub struct RuleContext {
    pub user_id: Uuid,
    pub fields: HashMap<String, Value>,
    pub artist_id: Option<Uuid>,
    pub album_id: Option<Uuid>,
    pub recommendation_id: Option<Uuid>,
    pub wishlist_item_id: Option<Uuid>,
}

impl RuleContext {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            fields: HashMap::new(),
            artist_id: None,
            album_id: None,
            recommendation_id: None,
            wishlist_item_id: None,
        }
    }

    fn with_schedule_fields(mut self) -> Self {
        let now = Utc::now();
        self.fields.insert("hour_of_day".to_string(), Value::from(now.hour()));
        self.fields.insert("day_of_week".to_string(), Value::from(now.weekday().num_days_from_monday()));
        self
    }
}

/// Evaluates every enabled rule for `trigger`, independently per matching
/// rule, in `priority DESC, created_at ASC` order. A rule that doesn't match
/// its conditions is silently skipped; one that errors mid-firing is logged
/// and counted, leaving the rest of the batch unaffected.
async fn evaluate(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    trigger: RuleTrigger,
    contexts: &HashMap<Uuid, RuleContext>,
) -> Result<JobOutcome> {
    let rules = entities.rules.enabled_for_trigger(trigger).await?;
    let mut outcome = JobOutcome::default();

    for rule in &rules {
        let Some(ctx) = contexts.get(&rule.user_id) else { continue };
        outcome.grabbed += 1;
        match fire(entities, integrations, rule, ctx).await {
            Ok(true) => outcome.processed += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(rule = %rule.name, error = %e, "rule execution failed");
                outcome.errors += 1;
            }
        }
    }

    Ok(outcome)
}

/// Returns whether the rule's conditions matched (and its actions ran).
async fn fire(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    rule: &AutomationRule,
    ctx: &RuleContext,
) -> Result<bool> {
    let conditions = rule.conditions_vec();
    if !condition::evaluate_all(&conditions, ctx) {
        return Ok(false);
    }

    entities.rules.record_trigger(rule.id).await?;

    let mut log = Vec::new();
    for rule_action in rule.actions_vec() {
        let result = action::execute(&rule_action, ctx, entities, integrations).await;
        let succeeded = result.is_ok();
        log.push((rule_action.kind, succeeded));
        match result {
            Ok(action::Outcome::Skip) => break,
            Ok(action::Outcome::Continue) => {}
            Err(e) => warn!(rule = %rule.name, action = ?rule_action.kind, error = %e, "rule action failed"),
        }
    }

    info!(rule = %rule.name, user_id = %ctx.user_id, actions = ?log, "rule fired");
    Ok(true)
}

/// Entry point for the `check-playlist-urls` job: there's no external event
/// here, just a schedule tick, so every active user gets a bare context
/// carrying only the current hour/weekday.
pub async fn evaluate_playlist_url_rules(entities: &EntityStore, integrations: &IntegrationRegistry) -> Result<JobOutcome> {
    let users = entities.users.list_active().await?;
    let contexts: HashMap<Uuid, RuleContext> = users
        .into_iter()
        .map(|user| (user.id, RuleContext::new(user.id).with_schedule_fields()))
        .collect();

    evaluate(entities, integrations, RuleTrigger::PlaylistUrlCheck, &contexts).await
}

/// Entry point for `check-new-releases`: fires once per newly upserted
/// release, against every active user's `new_release` rules (a release isn't
/// owned by one user, so every rule owner gets a look at it).
pub async fn evaluate_new_release_rules(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    artist_id: Uuid,
    album_id: Uuid,
) -> Result<JobOutcome> {
    let users = entities.users.list_active().await?;
    let contexts: HashMap<Uuid, RuleContext> = users
        .into_iter()
        .map(|user| {
            let mut ctx = RuleContext::new(user.id);
            ctx.artist_id = Some(artist_id);
            ctx.album_id = Some(album_id);
            (user.id, ctx)
        })
        .collect();

    evaluate(entities, integrations, RuleTrigger::NewRelease, &contexts).await
}

/// Entry point for `generate-daily-recommendations`: fires the owning user's
/// `recommendation_generated` rules against one freshly persisted
/// recommendation.
pub async fn evaluate_recommendation_generated_rules(
    entities: &EntityStore,
    integrations: &IntegrationRegistry,
    user_id: Uuid,
    recommendation_id: Uuid,
) -> Result<JobOutcome> {
    let mut ctx = RuleContext::new(user_id);
    ctx.recommendation_id = Some(recommendation_id);
    let contexts = HashMap::from([(user_id, ctx)]);

    evaluate(entities, integrations, RuleTrigger::RecommendationGenerated, &contexts).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_context_carries_hour_and_weekday() {
        let ctx = RuleContext::new(Uuid::new_v4()).with_schedule_fields();
        assert!(ctx.fields.contains_key("hour_of_day"));
        assert!(ctx.fields.contains_key("day_of_week"));
    }
}
