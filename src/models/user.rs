use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOPICS: &str = "Technology, Science, Innovation";

/// Topic preferences picked on the category screen
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPreferences {
    #[serde(default)]
    pub topic: Option<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            topic: Some(DEFAULT_TOPICS.to_string()),
        }
    }
}

impl UserPreferences {
    /// Individual topics, split on commas
    pub fn topics(&self) -> Vec<String> {
        self.topic
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub user_id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub preferences: UserPreferences,
}

impl UserRecord {
    pub fn new(user_id: String, email: String, preferences: Option<UserPreferences>) -> Self {
        Self {
            user_id,
            email,
            created_at: Utc::now(),
            preferences: preferences.unwrap_or_default(),
        }
    }
}
