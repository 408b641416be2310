use serde::{Deserialize, Serialize};

/// Lifecycle of a practice session as tracked by the remote session service.
///
/// The gateway reports the interview-session enum (`SCHEDULED`, `ONGOING`,
/// `COMPLETED`, `CANCELED`); the aliases accept both spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    #[serde(alias = "SCHEDULED")]
    Created,
    #[serde(alias = "ONGOING")]
    Active,
    #[serde(alias = "COMPLETED")]
    Ended,
    #[serde(alias = "CANCELLED")]
    Canceled,
    #[serde(other)]
    Unknown,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Canceled)
    }
}

/// One practice attempt. Only `id` is required by the client; everything else
/// is informational and defaults when the gateway omits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// The owning user.
    #[serde(default)]
    pub interviewee_id: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
    /// "yyyy-MM-dd HH:mm:ss", as formatted by the session service.
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            interviewee_id: None,
            status: SessionStatus::Active,
            started_at: None,
            ended_at: None,
        }
    }
}
