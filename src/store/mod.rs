pub mod bot_users;
pub mod leads;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::Result;

/// Thread-safe SQLite store for leads and bot users.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open or create the SQLite database at the given path and bring the
    /// schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL for better concurrent read behavior between the HTTP and bot sides
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // Run migrations on the raw connection before wrapping in Mutex.
        Self::run_migrations(&conn)?;

        info!("Store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Idempotent schema setup, safe to run on every start. The base tables
    /// must be creatable or this fails; the legacy-column cleanup on top is
    /// best-effort and only logs.
    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS leads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS bot_users (
                telegram_id INTEGER PRIMARY KEY,
                username TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;

        upgrade_legacy_schema(conn);

        Ok(())
    }
}

/// Clean up schema shapes left behind by earlier deployments: a `password`
/// column that never belonged on leads, and `phone_number` which was renamed
/// to `phone`. Each step is independent and skipped when already applied.
fn upgrade_legacy_schema(conn: &Connection) {
    if column_exists(conn, "leads", "password") {
        if let Err(e) = conn.execute_batch("ALTER TABLE leads DROP COLUMN password") {
            warn!("Migration: failed to drop leads.password: {}", e);
        } else {
            info!("Migration: dropped legacy leads.password column");
        }
    }

    if column_exists(conn, "leads", "phone_number") {
        if let Err(e) = conn.execute_batch("ALTER TABLE leads DROP COLUMN phone_number") {
            warn!("Migration: failed to drop leads.phone_number: {}", e);
        } else {
            info!("Migration: dropped legacy leads.phone_number column");
        }
    }

    if !column_exists(conn, "leads", "phone") {
        if let Err(e) = conn.execute_batch("ALTER TABLE leads ADD COLUMN phone TEXT") {
            warn!("Migration: failed to add leads.phone: {}", e);
        } else {
            info!("Migration: added leads.phone column");
        }
    }
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    conn.query_row(
        "SELECT count(*) > 0 FROM pragma_table_info(?1) WHERE name = ?2",
        rusqlite::params![table, column],
        |row| row.get(0),
    )
    .unwrap_or(false)
}

/// Parse SQLite timestamps: RFC 3339 or the `datetime('now')` default format.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        Store::run_migrations(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"leads".to_string()));
        assert!(tables.contains(&"bot_users".to_string()));
    }

    #[test]
    fn test_migrations_drop_legacy_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE leads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                password TEXT,
                phone_number TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .unwrap();

        Store::run_migrations(&conn).unwrap();

        assert!(!column_exists(&conn, "leads", "password"));
        assert!(!column_exists(&conn, "leads", "phone_number"));
        assert!(column_exists(&conn, "leads", "phone"));
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        Store::run_migrations(&conn).unwrap();
        Store::run_migrations(&conn).unwrap();

        assert!(column_exists(&conn, "leads", "phone"));
        assert!(column_exists(&conn, "bot_users", "telegram_id"));
    }

    #[test]
    fn test_migrations_preserve_existing_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE leads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                password TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            INSERT INTO leads (name, email, password) VALUES ('Ann', 'ann@x.io', 'hunter2');",
        )
        .unwrap();

        Store::run_migrations(&conn).unwrap();

        let (name, phone): (String, Option<String>) = conn
            .query_row("SELECT name, phone FROM leads WHERE id = 1", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(name, "Ann");
        assert_eq!(phone, None);
    }

    #[test]
    fn test_parse_datetime_formats() {
        let sqlite_default = parse_datetime("2026-08-30 12:34:56");
        assert_eq!(sqlite_default.to_rfc3339(), "2026-08-30T12:34:56+00:00");

        let rfc3339 = parse_datetime("2026-08-30T12:34:56+00:00");
        assert_eq!(rfc3339, sqlite_default);
    }
}
