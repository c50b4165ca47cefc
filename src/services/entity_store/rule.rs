//! Persistence for automation rules.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::rule::{AutomationRule, RuleAction, RuleCondition, RuleTrigger};

#[derive(Clone)]
pub struct RuleRepository {
    pool: PgPool,
}

impl RuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<AutomationRule> {
        sqlx::query_as::<_, AutomationRule>("SELECT * FROM automation_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("rule {id}")))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AutomationRule>> {
        Ok(sqlx::query_as::<_, AutomationRule>(
            "SELECT * FROM automation_rules WHERE user_id = $1 ORDER BY priority DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        name: &str,
        trigger: RuleTrigger,
        conditions: &[RuleCondition],
        actions: &[RuleAction],
        priority: i32,
    ) -> Result<AutomationRule> {
        let conditions = serde_json::to_value(conditions).unwrap_or(serde_json::json!([]));
        let actions = serde_json::to_value(actions).unwrap_or(serde_json::json!([]));
        Ok(sqlx::query_as::<_, AutomationRule>(
            r#"
            INSERT INTO automation_rules (
                id, user_id, name, enabled, trigger, conditions, actions, priority,
                trigger_count, created_at, updated_at
            ) VALUES ($1, $2, $3, true, $4, $5, $6, $7, 0, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .bind(trigger)
        .bind(conditions)
        .bind(actions)
        .bind(priority)
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE automation_rules SET enabled = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(enabled)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM automation_rules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Rules the rules engine evaluates for a fired `trigger`, ordered so
    /// higher-priority rules run first and ties break to the older rule.
    pub async fn enabled_for_trigger(&self, trigger: RuleTrigger) -> Result<Vec<AutomationRule>> {
        Ok(sqlx::query_as::<_, AutomationRule>(
            "SELECT * FROM automation_rules WHERE trigger = $1 AND enabled = true ORDER BY priority DESC, created_at ASC",
        )
        .bind(trigger)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn record_trigger(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE automation_rules SET last_triggered_at = $2, trigger_count = trigger_count + 1 WHERE id = $1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
