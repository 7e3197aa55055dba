//! Session handling logic
//!
//! Every operation reads or updates the one record named by
//! `GameConfig::session_name`.

use super::types::{AdminOutcome, InitOutcome, LoginOutcome, Target, TreasureRecord};
use crate::config::GameConfig;
use crate::db::{schema, Database};
use crate::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::sync::Arc;

/// Session handler for business logic
pub struct SessionHandler {
    db: Arc<Database>,
    game: Arc<GameConfig>,
}

impl SessionHandler {
    pub fn new(db: Arc<Database>, game: Arc<GameConfig>) -> Self {
        SessionHandler { db, game }
    }

    /// Create the session record from the seed unless it already exists
    pub async fn init(&self) -> Result<InitOutcome> {
        let seed = &self.game.seed;
        let record = TreasureRecord {
            session_name: self.game.session_name.clone(),
            unlock_code: seed.unlock_code.clone(),
            admin_code: seed.admin_code.clone(),
            target: Target {
                lat: seed.lat,
                lng: seed.lng,
            },
            release_time: seed.release_time.with_timezone(&Utc),
        };

        let created = self
            .db
            .with_conn(move |conn| schema::insert_treasure_if_absent(conn, &record))
            .await?;

        if created {
            tracing::info!(session = %self.game.session_name, "Session record created");
            Ok(InitOutcome::Created)
        } else {
            tracing::debug!(session = %self.game.session_name, "Session record already exists");
            Ok(InitOutcome::AlreadyExists)
        }
    }

    /// Load the session record
    pub async fn record(&self) -> Result<Option<TreasureRecord>> {
        let session_name = self.game.session_name.clone();
        self.db
            .with_conn(move |conn| schema::find_treasure(conn, &session_name))
            .await
    }

    /// Classify a login code at `now`. `None` means the session is not initialized.
    ///
    /// A missing code still requires an initialized session and is always
    /// denied.
    pub async fn login(
        &self,
        code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<LoginOutcome>> {
        let Some(record) = self.record().await? else {
            tracing::error!(session = %self.game.session_name, "Login attempted before init");
            return Ok(None);
        };

        let outcome = match code {
            Some(code) => evaluate_login(&record, code, self.game.bypass_code.as_deref(), now),
            None => LoginOutcome::Denied,
        };
        if outcome == LoginOutcome::Denied {
            tracing::debug!("Login denied");
        }
        Ok(Some(outcome))
    }

    /// Check the admin secret without changing anything
    pub async fn verify_admin(&self, secret: &str) -> Result<AdminOutcome> {
        Ok(match self.record().await? {
            None => AdminOutcome::NotInitialized,
            Some(record) if record.admin_code == secret => AdminOutcome::Accepted,
            Some(_) => AdminOutcome::Forbidden,
        })
    }

    /// Move the treasure. Applied only if `secret` is the admin code.
    pub async fn update_location(&self, secret: &str, target: Target) -> Result<AdminOutcome> {
        let session_name = self.game.session_name.clone();
        let secret_owned = secret.to_string();
        let changed = self
            .db
            .with_conn(move |conn| schema::update_target(conn, &session_name, &secret_owned, target))
            .await?;

        let outcome = self.resolve_update(changed).await?;
        if outcome == AdminOutcome::Accepted {
            tracing::info!(lat = target.lat, lng = target.lng, "Treasure target moved");
        }
        Ok(outcome)
    }

    /// Change the release time. Applied only if `secret` is the admin code.
    pub async fn update_release_time(
        &self,
        secret: &str,
        release_time: DateTime<Utc>,
    ) -> Result<AdminOutcome> {
        let session_name = self.game.session_name.clone();
        let secret_owned = secret.to_string();
        let changed = self
            .db
            .with_conn(move |conn| {
                schema::update_release_time(conn, &session_name, &secret_owned, release_time)
            })
            .await?;

        let outcome = self.resolve_update(changed).await?;
        if outcome == AdminOutcome::Accepted {
            tracing::info!(release_time = %release_time, "Release time changed");
        }
        Ok(outcome)
    }

    /// Current release time, if the session exists
    pub async fn status(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.record().await?.map(|record| record.release_time))
    }

    // A conditional update touched no rows: either the secret was wrong or
    // there is no record at all.
    async fn resolve_update(&self, changed: usize) -> Result<AdminOutcome> {
        if changed > 0 {
            return Ok(AdminOutcome::Accepted);
        }

        let session_name = self.game.session_name.clone();
        let exists = self
            .db
            .with_conn(move |conn| schema::treasure_exists(conn, &session_name))
            .await?;

        if exists {
            tracing::warn!(session = %self.game.session_name, "Rejected admin update: bad secret");
            Ok(AdminOutcome::Forbidden)
        } else {
            tracing::error!(session = %self.game.session_name, "Admin update before init");
            Ok(AdminOutcome::NotInitialized)
        }
    }
}

/// Classify a login code against the record.
///
/// Priority: admin code, then the bypass code, then the unlock code (gated by
/// `release_time`; equal instants count as released).
pub fn evaluate_login(
    record: &TreasureRecord,
    code: &str,
    bypass_code: Option<&str>,
    now: DateTime<Utc>,
) -> LoginOutcome {
    if code == record.admin_code {
        return LoginOutcome::Admin {
            current_release: record.release_time,
        };
    }

    if bypass_code == Some(code) {
        return LoginOutcome::User {
            target: record.target,
        };
    }

    if code == record.unlock_code {
        if now < record.release_time {
            return LoginOutcome::Countdown {
                release_time: record.release_time,
            };
        }
        return LoginOutcome::User {
            target: record.target,
        };
    }

    LoginOutcome::Denied
}

/// Parse a submitted release time.
///
/// Accepts RFC 3339 strings, naive `YYYY-MM-DDTHH:MM[:SS]` strings (read as
/// UTC), bare `YYYY-MM-DD` dates (UTC midnight) and epoch milliseconds,
/// fractional millis truncated.
pub fn parse_release_time(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(raw) => {
            let raw = raw.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Some(naive) = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            {
                return Some(naive.and_utc());
            }
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        serde_json::Value::Number(n) => {
            if let Some(millis) = n.as_i64() {
                return Utc.timestamp_millis_opt(millis).single();
            }
            let millis = n.as_f64().filter(|m| m.is_finite())?.trunc();
            if millis < i64::MIN as f64 || millis > i64::MAX as f64 {
                return None;
            }
            Utc.timestamp_millis_opt(millis as i64).single()
        }
        _ => None,
    }
}
