use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a session left the authenticated state without an explicit logout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExpirationReason {
    /// The absolute lifetime elapsed.
    Expired,
    /// The sliding inactivity window elapsed.
    Inactivity,
}

impl ExpirationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpirationReason::Expired => "expired",
            ExpirationReason::Inactivity => "inactivity",
        }
    }
}

impl fmt::Display for ExpirationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted singleton session record. All timestamps are epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub created_at: i64,
    /// Absolute deadline; never changes after creation.
    pub expires_at: i64,
    pub last_activity: i64,
    pub active_credential_id: String,
}

impl SessionRecord {
    pub fn start(credential_id: impl Into<String>, now: i64, max_duration_millis: i64) -> Self {
        Self {
            created_at: now,
            expires_at: now.saturating_add(max_duration_millis),
            last_activity: now,
            active_credential_id: credential_id.into(),
        }
    }

    /// Deadline of the sliding inactivity window.
    pub fn inactivity_deadline(&self, inactivity_timeout_millis: i64) -> i64 {
        self.last_activity.saturating_add(inactivity_timeout_millis)
    }

    /// Which deadline has elapsed at `now`, if any. The absolute deadline wins ties.
    pub fn expiration_at(
        &self,
        now: i64,
        inactivity_timeout_millis: i64,
    ) -> Option<ExpirationReason> {
        if now > self.expires_at {
            Some(ExpirationReason::Expired)
        } else if now > self.inactivity_deadline(inactivity_timeout_millis) {
            Some(ExpirationReason::Inactivity)
        } else {
            None
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            is_authenticated: true,
            expires_at: self.expires_at,
            active_credential_id: self.active_credential_id.clone(),
            last_activity: self.last_activity,
        }
    }
}

/// Read view handed to callers of the session manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub is_authenticated: bool,
    pub expires_at: i64,
    pub active_credential_id: String,
    pub last_activity: i64,
}
