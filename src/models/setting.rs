use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row shape matches §3 exactly: `value` is an opaque string, typed only at
/// read time by the settings store's accessor methods.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SettingEntry {
    pub key: String,
    pub value: String,
    pub category: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: String,
}
