use std::time::Duration;

/// Default absolute session lifetime.
pub const DEFAULT_MAX_SESSION_DURATION: Duration = Duration::from_secs(30 * 60);
/// Default sliding inactivity window.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Deadlines applied to every session a manager starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Absolute lifetime measured from session start; never extended.
    pub max_session_duration: Duration,
    /// Allowed gap between recorded activities.
    pub inactivity_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_session_duration: DEFAULT_MAX_SESSION_DURATION,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn from_minutes(max_session_minutes: u64, inactivity_minutes: u64) -> Self {
        Self {
            max_session_duration: Duration::from_secs(max_session_minutes.saturating_mul(60)),
            inactivity_timeout: Duration::from_secs(inactivity_minutes.saturating_mul(60)),
        }
    }
}
