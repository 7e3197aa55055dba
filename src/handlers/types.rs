//! Types for the treasure hunt session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub lat: f64,
    pub lng: f64,
}

impl Target {
    /// Both coordinates are finite numbers. Ranges are not checked.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// The single persisted session record
#[derive(Debug, Clone, PartialEq)]
pub struct TreasureRecord {
    pub session_name: String,
    pub unlock_code: String,
    pub admin_code: String,
    pub target: Target,
    pub release_time: DateTime<Utc>,
}

/// Result of classifying a submitted login code
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum LoginOutcome {
    /// Organizer; never time-gated
    Admin {
        #[serde(with = "iso_millis")]
        current_release: DateTime<Utc>,
    },
    /// Participant with access to the target
    User { target: Target },
    /// Participant who is early
    Countdown {
        #[serde(with = "iso_millis")]
        release_time: DateTime<Utc>,
    },
    /// Nothing matched
    #[serde(skip)]
    Denied,
}

/// Outcome of the one-time session initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    AlreadyExists,
}

/// Outcome of an admin-gated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminOutcome {
    Accepted,
    Forbidden,
    NotInitialized,
}

/// Serializes timestamps as `2026-02-08T02:00:00.000Z`
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }
}
