use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use taskforge_core::types::WorkingMemoryRecord;

use crate::error::Result;

const DEFAULT_TTL_SECS: i64 = 3600;

/// TTL-bounded keyed notes, deliberately not embedded or indexed for vector
/// search (spec §3, §4.3). Every read sweeps expired-and-not-promoted rows
/// first.
pub struct WorkingMemoryStore {
    conn: Mutex<Connection>,
}

impl WorkingMemoryStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    pub fn set(&self, key: &str, value: &str, context: &str, ttl: Option<Duration>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let expires_at = now + ttl.unwrap_or_else(|| Duration::seconds(DEFAULT_TTL_SECS));
        conn.execute(
            "INSERT INTO working_memory (key, value, context, expires_at, promote_flag, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, context=excluded.context,
                expires_at=excluded.expires_at",
            params![key, value, context, expires_at.to_rfc3339(), now.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<WorkingMemoryRecord>> {
        self.sweep()?;
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT key,value,context,expires_at,promote_flag,created_at FROM working_memory WHERE key=?1",
            params![key],
            row_to_record,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn get_all(&self) -> Result<Vec<WorkingMemoryRecord>> {
        self.sweep()?;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT key,value,context,expires_at,promote_flag,created_at FROM working_memory")?;
        let rows = stmt.query_map([], row_to_record)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn count(&self) -> Result<usize> {
        self.sweep()?;
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM working_memory", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn mark_for_promotion(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE working_memory SET promote_flag = 1 WHERE key = ?1",
            params![key],
        )?;
        Ok(())
    }

    /// Flagged entries are returned regardless of expiry — promotion is the
    /// caller's (memory store's) job to then delete them from here.
    pub fn get_promotion_candidates(&self) -> Result<Vec<WorkingMemoryRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT key,value,context,expires_at,promote_flag,created_at FROM working_memory WHERE promote_flag = 1",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn sweep(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let n = conn.execute(
            "DELETE FROM working_memory WHERE expires_at <= ?1 AND promote_flag = 0",
            params![now],
        )?;
        Ok(n)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkingMemoryRecord> {
    let expires_at: String = row.get(3)?;
    let created_at: String = row.get(5)?;
    Ok(WorkingMemoryRecord {
        key: row.get(0)?,
        value: row.get(1)?,
        context: row.get(2)?,
        expires_at: parse_rfc3339(&expires_at),
        promote_flag: row.get::<_, i64>(4)? != 0,
        created_at: parse_rfc3339(&created_at),
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
