//! SQLite schema and queries for the session record
//!
//! One row per session name. Updates are conditional on the admin code so the
//! secret check and the write happen in a single statement.

use crate::handlers::types::{iso_millis, Target, TreasureRecord};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

/// Initialize the database with required tables
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS treasures (
            session_name TEXT PRIMARY KEY,
            unlock_code TEXT NOT NULL,
            admin_code TEXT NOT NULL,
            target_lat REAL NOT NULL,
            target_lng REAL NOT NULL,
            release_time TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

fn parse_timestamp(idx: usize, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_record(row: &Row<'_>) -> Result<TreasureRecord> {
    let release_raw: String = row.get(5)?;
    Ok(TreasureRecord {
        session_name: row.get(0)?,
        unlock_code: row.get(1)?,
        admin_code: row.get(2)?,
        target: Target {
            lat: row.get(3)?,
            lng: row.get(4)?,
        },
        release_time: parse_timestamp(5, &release_raw)?,
    })
}

/// Load the record for a session, if any
pub fn find_treasure(conn: &Connection, session_name: &str) -> Result<Option<TreasureRecord>> {
    conn.query_row(
        "SELECT session_name, unlock_code, admin_code, target_lat, target_lng, release_time
         FROM treasures WHERE session_name = ?",
        [session_name],
        row_to_record,
    )
    .optional()
}

/// Whether a record exists for a session
pub fn treasure_exists(conn: &Connection, session_name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM treasures WHERE session_name = ?)",
        [session_name],
        |row| row.get(0),
    )
}

/// Insert a record unless one already exists. Returns true if inserted.
pub fn insert_treasure_if_absent(conn: &Connection, record: &TreasureRecord) -> Result<bool> {
    let now = iso_millis::format(&Utc::now());
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO treasures
            (session_name, unlock_code, admin_code, target_lat, target_lng, release_time,
             created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            record.session_name,
            record.unlock_code,
            record.admin_code,
            record.target.lat,
            record.target.lng,
            iso_millis::format(&record.release_time),
            now,
            now
        ],
    )?;
    Ok(inserted > 0)
}

/// Overwrite the target if `admin_secret` matches. Returns rows changed.
pub fn update_target(
    conn: &Connection,
    session_name: &str,
    admin_secret: &str,
    target: Target,
) -> Result<usize> {
    conn.execute(
        "UPDATE treasures SET target_lat = ?, target_lng = ?, updated_at = ?
         WHERE session_name = ? AND admin_code = ?",
        params![
            target.lat,
            target.lng,
            iso_millis::format(&Utc::now()),
            session_name,
            admin_secret
        ],
    )
}

/// Overwrite the release time if `admin_secret` matches. Returns rows changed.
pub fn update_release_time(
    conn: &Connection,
    session_name: &str,
    admin_secret: &str,
    release_time: DateTime<Utc>,
) -> Result<usize> {
    conn.execute(
        "UPDATE treasures SET release_time = ?, updated_at = ?
         WHERE session_name = ? AND admin_code = ?",
        params![
            iso_millis::format(&release_time),
            iso_millis::format(&Utc::now()),
            session_name,
            admin_secret
        ],
    )
}

/// Number of stored session records
pub fn count_treasures(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM treasures", [], |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> TreasureRecord {
        TreasureRecord {
            session_name: "magelang_2026".to_string(),
            unlock_code: "4913".to_string(),
            admin_code: "admin".to_string(),
            target: Target {
                lat: -7.7956,
                lng: 110.3695,
            },
            release_time: Utc.with_ymd_and_hms(2026, 2, 8, 2, 0, 0).unwrap(),
        }
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_is_idempotent() {
        let conn = setup();
        assert!(insert_treasure_if_absent(&conn, &record()).unwrap());

        let mut other = record();
        other.unlock_code = "0000".to_string();
        assert!(!insert_treasure_if_absent(&conn, &other).unwrap());

        assert_eq!(count_treasures(&conn).unwrap(), 1);
        let stored = find_treasure(&conn, "magelang_2026").unwrap().unwrap();
        assert_eq!(stored, record());
    }

    #[test]
    fn test_find_missing_session() {
        let conn = setup();
        assert!(find_treasure(&conn, "nope").unwrap().is_none());
        assert!(!treasure_exists(&conn, "nope").unwrap());
    }

    #[test]
    fn test_updates_require_admin_code() {
        let conn = setup();
        insert_treasure_if_absent(&conn, &record()).unwrap();

        let moved = Target { lat: 1.5, lng: 2.5 };
        assert_eq!(update_target(&conn, "magelang_2026", "4913", moved).unwrap(), 0);
        assert_eq!(update_target(&conn, "magelang_2026", "admin", moved).unwrap(), 1);

        let later = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            update_release_time(&conn, "magelang_2026", "wrong", later).unwrap(),
            0
        );
        assert_eq!(
            update_release_time(&conn, "magelang_2026", "admin", later).unwrap(),
            1
        );

        let stored = find_treasure(&conn, "magelang_2026").unwrap().unwrap();
        assert_eq!(stored.target, moved);
        assert_eq!(stored.release_time, later);
    }
}
