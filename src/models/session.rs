use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::UserAccessibilityProfile;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Complete,
    Aborted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "NotStarted",
            SessionStatus::InProgress => "InProgress",
            SessionStatus::Complete => "Complete",
            SessionStatus::Aborted => "Aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Aborted)
    }
}

/// Persisted header of an assessment session. Outcomes are stored separately,
/// one row per completed sub-test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub profile: UserAccessibilityProfile,
    pub plan: Vec<String>,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
