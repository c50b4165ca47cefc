use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RuleTrigger {
    NewRelease,
    LibrarySync,
    RecommendationGenerated,
    ListeningMilestone,
    NewArtistDiscovered,
    Schedule,
    PlaylistUrlCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    InList,
    NotInList,
    MatchesRegex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleActionKind {
    AddToWishlist,
    StartDownload,
    AddToPlaylist,
    SendNotification,
    TagItem,
    SetQualityProfile,
    SkipItem,
    AddToLibrary,
    ImportPlaylistUrl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleAction {
    pub kind: RuleActionKind,
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AutomationRule {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub enabled: bool,

    pub trigger: RuleTrigger,
    pub conditions: serde_json::Value,
    pub actions: serde_json::Value,

    pub priority: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub trigger_count: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AutomationRule {
    pub fn conditions_vec(&self) -> Vec<RuleCondition> {
        serde_json::from_value(self.conditions.clone()).unwrap_or_default()
    }

    pub fn actions_vec(&self) -> Vec<RuleAction> {
        serde_json::from_value(self.actions.clone()).unwrap_or_default()
    }
}
