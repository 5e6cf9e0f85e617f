use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Kind of user action on a video card
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    View,
    Click,
    Select,
    Deselect,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::Click => "click",
            InteractionType::Select => "select",
            InteractionType::Deselect => "deselect",
        }
    }
}

impl Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "view" => Ok(InteractionType::View),
            "click" => Ok(InteractionType::Click),
            "select" => Ok(InteractionType::Select),
            "deselect" => Ok(InteractionType::Deselect),
            other => Err(format!("unknown interaction type '{}'", other)),
        }
    }
}

/// A single recorded user action. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionEvent {
    pub user_id: String,
    pub video_id: String,
    pub interaction_type: InteractionType,
    pub is_recommended: bool,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Interaction as submitted by a client to the ingest endpoint
///
/// `session_id` and `timestamp` are optional on the wire and filled in
/// by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionPayload {
    pub user_id: String,
    pub video_id: String,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub is_recommended: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl InteractionPayload {
    pub fn into_event(self, default_session_id: &str) -> InteractionEvent {
        InteractionEvent {
            user_id: self.user_id,
            video_id: self.video_id,
            interaction_type: self.interaction_type,
            is_recommended: self.is_recommended,
            session_id: self
                .session_id
                .unwrap_or_else(|| default_session_id.to_string()),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

/// Read-back filter for stored interactions
#[derive(Debug, Clone, Default)]
pub struct InteractionFilter {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_type_serialization() {
        let json = serde_json::to_string(&InteractionType::Deselect).unwrap();
        assert_eq!(json, "\"deselect\"");

        let parsed: InteractionType = serde_json::from_str("\"click\"").unwrap();
        assert_eq!(parsed, InteractionType::Click);
    }

    #[test]
    fn test_interaction_type_from_str() {
        assert_eq!("SELECT".parse::<InteractionType>(), Ok(InteractionType::Select));
        assert!("hover".parse::<InteractionType>().is_err());
    }

    #[test]
    fn test_payload_without_session_uses_default() {
        let payload: InteractionPayload = serde_json::from_str(
            r#"{"user_id":"u1","video_id":"v1","interaction_type":"view"}"#,
        )
        .unwrap();

        let event = payload.into_event("session_fallback");
        assert_eq!(event.session_id, "session_fallback");
        assert!(!event.is_recommended);
    }

    #[test]
    fn test_payload_keeps_client_session() {
        let payload: InteractionPayload = serde_json::from_str(
            r#"{"user_id":"u1","video_id":"v1","interaction_type":"select",
                "is_recommended":true,"session_id":"session_1",
                "timestamp":"2025-01-02T03:04:05Z"}"#,
        )
        .unwrap();

        let event = payload.into_event("ignored");
        assert_eq!(event.session_id, "session_1");
        assert!(event.is_recommended);
        assert_eq!(event.timestamp.to_rfc3339(), "2025-01-02T03:04:05+00:00");
    }
}
