use chrono::{Duration, Utc};
use rusqlite::params;

use crate::error::Result;
use crate::store::MemoryStore;

#[derive(Debug, Clone, Default)]
pub struct GcReport {
    pub deleted: Vec<String>,
    pub skipped: usize,
}

impl MemoryStore {
    /// Garbage-collect per spec §4.3: zero-access `auto` records older than
    /// `auto_max_age` are deleted; `conversation`-source records older than
    /// `conversation_max_age` are deleted; `manual`/`compaction` are never
    /// touched. `dry_run` lists candidates instead of deleting them.
    pub fn collect_garbage(
        &self,
        auto_max_age: Duration,
        conversation_max_age: Duration,
        dry_run: bool,
    ) -> Result<GcReport> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let auto_cutoff = (now - auto_max_age).to_rfc3339();
        let conversation_cutoff = (now - conversation_max_age).to_rfc3339();

        let mut stmt = conn.prepare(
            "SELECT id, key, source, access_count, created_at FROM memories
             WHERE source IN ('auto', 'conversation')",
        )?;
        let rows: Vec<(i64, String, String, i64, String)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);

        let mut deleted = Vec::new();
        let mut skipped = 0usize;

        for (id, key, source, access_count, created_at) in rows {
            let eligible = match source.as_str() {
                "auto" => access_count == 0 && created_at < auto_cutoff,
                "conversation" => created_at < conversation_cutoff,
                _ => false,
            };
            if !eligible {
                if source == "auto" && access_count > 0 {
                    skipped += 1;
                }
                continue;
            }
            if !dry_run {
                conn.execute(
                    "INSERT INTO memories_fts(memories_fts, rowid, key, value)
                     SELECT 'delete', id, key, value FROM memories WHERE id = ?1",
                    params![id],
                )
                .ok();
                conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
            }
            deleted.push(key);
        }

        Ok(GcReport { deleted, skipped })
    }
}
