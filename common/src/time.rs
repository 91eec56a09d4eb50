//! Time utilities and policy constants.

use chrono::{DateTime, Duration, Utc};

/// Engine timing constants.
pub mod constants {
    use super::Duration;

    /// How long an issued quote stays valid (24 hours).
    pub fn quote_validity() -> Duration {
        Duration::hours(24)
    }
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Check if a timestamp has expired (is in the past).
pub fn is_expired(expiry: Timestamp) -> bool {
    now() > expiry
}

/// Calculate expiry time from now.
pub fn expires_in(duration: Duration) -> Timestamp {
    now() + duration
}
