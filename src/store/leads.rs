use chrono::{DateTime, Utc};

use super::{parse_datetime, Store};
use crate::error::Result;

/// A prospective-customer record submitted through the intake endpoint.
#[derive(Debug, Clone)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn map_lead(row: &rusqlite::Row) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

impl Store {
    /// Insert a new lead and return the fully materialized row, including
    /// the generated id and creation timestamp.
    pub async fn insert_lead(&self, name: &str, email: &str, phone: Option<&str>) -> Result<Lead> {
        let conn = self.conn.lock().await;

        conn.execute(
            "INSERT INTO leads (name, email, phone) VALUES (?1, ?2, ?3)",
            rusqlite::params![name, email, phone],
        )?;

        let id = conn.last_insert_rowid();
        let lead = conn.query_row(
            "SELECT id, name, email, phone, created_at FROM leads WHERE id = ?1",
            rusqlite::params![id],
            map_lead,
        )?;

        Ok(lead)
    }

    /// All leads, newest first.
    pub async fn list_all_leads(&self) -> Result<Vec<Lead>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, email, phone, created_at FROM leads
             ORDER BY created_at DESC, id DESC",
        )?;

        let leads = stmt
            .query_map([], map_lead)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(leads)
    }

    /// The `limit` newest leads.
    pub async fn list_recent_leads(&self, limit: i64) -> Result<Vec<Lead>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, email, phone, created_at FROM leads
             ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;

        let leads = stmt
            .query_map(rusqlite::params![limit], map_lead)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(leads)
    }
}
