use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use taskforge_core::types::{ContentType, MatchType, MemoryCategory, MemoryHit, MemoryRecord, MemorySource};

use crate::error::{MemoryError, Result};
use crate::types::{MemoryFilters, SetOptions};

/// Keyed blob store with FTS5 and cosine-similarity vector search.
/// Single-writer through SQLite, guarded by a mutex — one connection, WAL
/// journaling left to the collaborator that opens it.
pub struct MemoryStore {
    pub(crate) conn: Mutex<Connection>,
    embedding_dimension: usize,
}

impl MemoryStore {
    pub fn new(conn: Connection, embedding_dimension: usize) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedding_dimension,
        })
    }

    /// Upsert a keyed record. See spec §4.3 / invariant 6 for the
    /// session-collision suffixing rule.
    pub fn set(&self, key: &str, value: &str, opts: SetOptions) -> Result<String> {
        if let Some(embedding) = &opts.embedding {
            if embedding.len() != self.embedding_dimension {
                return Err(MemoryError::DimensionMismatch {
                    expected: self.embedding_dimension,
                    actual: embedding.len(),
                });
            }
        }

        let category = opts.category.unwrap_or(MemoryCategory::Other);
        let source = opts.source.unwrap_or(MemorySource::Manual);
        let content_type = opts.content_type.unwrap_or(ContentType::Text);
        let now = Utc::now();

        let conn = self.conn.lock().unwrap();

        let actual_key = self.resolve_write_key(&conn, key, source, opts.session_id.as_deref())?;

        let existing_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM memories WHERE key = ?1",
                params![actual_key],
                |row| row.get(0),
            )
            .optional()?;

        let embedding_blob = opts.embedding.as_ref().map(|v| f32_slice_to_blob(v));

        match existing_id {
            Some(id) => {
                conn.execute(
                    "UPDATE memories SET value=?1, content_type=?2, category=?3, source=?4,
                     session_id=?5, image_path=?6, embedding=?7, embedding_dim=?8, updated_at=?9
                     WHERE id=?10",
                    params![
                        value,
                        content_type_str(content_type),
                        category_str(category),
                        source_str(source),
                        opts.session_id,
                        opts.image_path,
                        embedding_blob,
                        opts.embedding.as_ref().map(|v| v.len() as i64),
                        now.to_rfc3339(),
                        id,
                    ],
                )?;
                sync_fts(&conn, id, &actual_key, value)?;
            }
            None => {
                conn.execute(
                    "INSERT INTO memories
                     (key, value, content_type, category, source, session_id, image_path,
                      embedding, embedding_dim, created_at, updated_at, last_accessed_at, access_count)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?10,?10,0)",
                    params![
                        actual_key,
                        value,
                        content_type_str(content_type),
                        category_str(category),
                        source_str(source),
                        opts.session_id,
                        opts.image_path,
                        embedding_blob,
                        opts.embedding.as_ref().map(|v| v.len() as i64),
                        now.to_rfc3339(),
                    ],
                )?;
                let id = conn.last_insert_rowid();
                sync_fts(&conn, id, &actual_key, value)?;
            }
        }

        Ok(actual_key)
    }

    /// Implements the suffixing rule from spec §4.3 / invariant 6: an
    /// `auto`/`compaction` write with a session_id that collides with a
    /// different session's existing record gets redirected to `key_2`,
    /// `key_3`, ... A `manual` write (or any write without a session_id)
    /// always targets the literal key.
    fn resolve_write_key(
        &self,
        conn: &Connection,
        key: &str,
        source: MemorySource,
        session_id: Option<&str>,
    ) -> Result<String> {
        let needs_suffix_check = matches!(source, MemorySource::Auto | MemorySource::Compaction)
            && session_id.is_some();
        if !needs_suffix_check {
            return Ok(key.to_string());
        }

        let mut candidate = key.to_string();
        let mut suffix = 2;
        loop {
            let existing_session: Option<Option<String>> = conn
                .query_row(
                    "SELECT session_id FROM memories WHERE key = ?1",
                    params![candidate],
                    |row| row.get(0),
                )
                .optional()?;

            match existing_session {
                None => return Ok(candidate),
                Some(existing) if existing.as_deref() == session_id => return Ok(candidate),
                Some(_) => {
                    candidate = format!("{key}_{suffix}");
                    suffix += 1;
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<MemoryRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT key,value,content_type,category,source,session_id,image_path,
                    embedding,created_at,updated_at,last_accessed_at,access_count
             FROM memories WHERE key = ?1",
            params![key],
            row_to_record,
        )
        .optional()
        .map_err(MemoryError::from)
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let id: Option<i64> = conn
            .query_row("SELECT id FROM memories WHERE key=?1", params![key], |r| r.get(0))
            .optional()?;
        let Some(id) = id else { return Ok(false) };
        conn.execute(
            "INSERT INTO memories_fts(memories_fts, rowid, key, value) SELECT 'delete', id, key, value FROM memories WHERE id=?1",
            params![id],
        )?;
        conn.execute("DELETE FROM memories WHERE id=?1", params![id])?;
        Ok(true)
    }

    /// Bump `last_accessed_at`/`access_count` for each key that exists.
    /// No-op for an empty list (invariant 7).
    pub fn record_access(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        for key in keys {
            conn.execute(
                "UPDATE memories SET access_count = access_count + 1, last_accessed_at = ?1
                 WHERE key = ?2",
                params![now, key],
            )?;
        }
        Ok(())
    }

    pub fn search_fts(&self, query: &str, limit: usize) -> Result<Vec<MemoryHit>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT m.key,m.value,m.content_type,m.category,m.source,m.session_id,m.image_path,
                    m.embedding,m.created_at,m.updated_at,m.last_accessed_at,m.access_count,
                    rank
             FROM memories m JOIN memories_fts f ON m.id = f.rowid
             WHERE memories_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![query, limit as i64], |row| {
            let record = row_to_record(row)?;
            let rank: f64 = row.get(12)?;
            // FTS5 rank is negative (closer to zero = better); normalize to
            // a positive score loosely comparable to vector cosine scores.
            Ok((record, (-rank) as f32))
        })?;
        Ok(rows
            .filter_map(|r| r.ok())
            .map(|(record, score)| MemoryHit {
                record,
                score,
                match_type: MatchType::Fts,
            })
            .collect())
    }

    pub fn search_vector(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filters: &MemoryFilters,
    ) -> Result<Vec<MemoryHit>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT key,value,content_type,category,source,session_id,image_path,
                    embedding,created_at,updated_at,last_accessed_at,access_count
             FROM memories WHERE embedding IS NOT NULL",
        )?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut hits: Vec<MemoryHit> = Vec::new();
        for row in rows.filter_map(|r| r.ok()) {
            if !filters.matches(row.category, row.source, row.content_type, row.created_at) {
                continue;
            }
            let Some(embedding) = &row.embedding else { continue };
            let score = cosine_similarity(query_embedding, embedding);
            hits.push(MemoryHit {
                record: row,
                score,
                match_type: MatchType::Vector,
            });
        }
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Tokenize `text` via `embed` and delegate to `search_vector`. Falls
    /// back to FTS when no embedding provider is available.
    pub fn search_semantic(
        &self,
        text: &str,
        limit: usize,
        filters: &MemoryFilters,
        embed: Option<&dyn Fn(&str) -> Option<Vec<f32>>>,
    ) -> Result<Vec<MemoryHit>> {
        match embed.and_then(|f| f(text)) {
            Some(embedding) => self.search_vector(&embedding, limit, filters),
            None => self.search_fts(text, limit),
        }
    }

    /// Fuse FTS and vector retrieval per spec §4.3: both run at `2*limit`,
    /// combined per-key with a weighted sum (missing side contributes 0).
    pub fn search_hybrid(
        &self,
        query: &str,
        limit: usize,
        fts_weight: f32,
        vector_weight: f32,
        filters: &MemoryFilters,
        query_embedding: Option<&[f32]>,
    ) -> Result<Vec<MemoryHit>> {
        let fts_hits = self.search_fts(query, limit * 2)?;
        let vector_hits = match query_embedding {
            Some(emb) => self.search_vector(emb, limit * 2, filters)?,
            None => Vec::new(),
        };

        // Normalize FTS scores into (0,1] so the weighted sum is comparable
        // to vector cosine scores, which are already bounded.
        let max_fts = fts_hits.iter().map(|h| h.score).fold(0.0_f32, f32::max).max(1e-6);

        let mut combined: std::collections::HashMap<String, (MemoryRecord, f32, bool, bool)> =
            std::collections::HashMap::new();

        for hit in fts_hits {
            if !filters.matches(hit.record.category, hit.record.source, hit.record.content_type, hit.record.created_at) {
                continue;
            }
            let normalized = hit.score / max_fts;
            let entry = combined
                .entry(hit.record.key.clone())
                .or_insert((hit.record.clone(), 0.0, false, false));
            entry.1 += normalized * fts_weight;
            entry.2 = true;
        }
        for hit in vector_hits {
            let entry = combined
                .entry(hit.record.key.clone())
                .or_insert((hit.record.clone(), 0.0, false, false));
            entry.1 += hit.score * vector_weight;
            entry.3 = true;
        }

        let mut out: Vec<MemoryHit> = combined
            .into_values()
            .map(|(record, score, in_fts, in_vector)| MemoryHit {
                record,
                score,
                match_type: match (in_fts, in_vector) {
                    (true, true) => MatchType::Hybrid,
                    (true, false) => MatchType::Fts,
                    (false, true) => MatchType::Vector,
                    (false, false) => MatchType::Hybrid,
                },
            })
            .collect();
        out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        out.truncate(limit);
        Ok(out)
    }

    pub fn get_by_filters(&self, filters: &MemoryFilters, limit: usize) -> Result<Vec<MemoryRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT key,value,content_type,category,source,session_id,image_path,
                    embedding,created_at,updated_at,last_accessed_at,access_count
             FROM memories ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut out = Vec::new();
        for row in rows.filter_map(|r| r.ok()) {
            if filters.matches(row.category, row.source, row.content_type, row.created_at) {
                out.push(row);
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }
}

fn sync_fts(conn: &Connection, id: i64, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO memories_fts(memories_fts, rowid, key, value) VALUES('delete', ?1, ?2, ?3)",
        params![id, key, value],
    )
    .ok(); // no-op if the row didn't previously exist in the FTS index
    conn.execute(
        "INSERT INTO memories_fts(rowid, key, value) VALUES (?1, ?2, ?3)",
        params![id, key, value],
    )?;
    Ok(())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn f32_slice_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_f32_vec(b: &[u8]) -> Vec<f32> {
    b.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn content_type_str(c: ContentType) -> &'static str {
    match c {
        ContentType::Text => "text",
        ContentType::Image => "image",
        ContentType::Multimodal => "multimodal",
    }
}

fn category_str(c: MemoryCategory) -> &'static str {
    match c {
        MemoryCategory::Fact => "fact",
        MemoryCategory::Preference => "preference",
        MemoryCategory::Decision => "decision",
        MemoryCategory::Project => "project",
        MemoryCategory::Entity => "entity",
        MemoryCategory::Lesson => "lesson",
        MemoryCategory::Conversation => "conversation",
        MemoryCategory::Other => "other",
    }
}

fn source_str(s: MemorySource) -> &'static str {
    match s {
        MemorySource::Manual => "manual",
        MemorySource::Auto => "auto",
        MemorySource::Conversation => "conversation",
        MemorySource::Compaction => "compaction",
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let content_type_s: String = row.get(2)?;
    let category_s: String = row.get(3)?;
    let source_s: String = row.get(4)?;
    let embedding_blob: Option<Vec<u8>> = row.get(7)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;
    let last_accessed_at: String = row.get(10)?;

    Ok(MemoryRecord {
        key: row.get(0)?,
        value: row.get(1)?,
        content_type: match content_type_s.as_str() {
            "image" => ContentType::Image,
            "multimodal" => ContentType::Multimodal,
            _ => ContentType::Text,
        },
        category: parse_category(&category_s),
        source: parse_source(&source_s),
        session_id: row.get(5)?,
        image_path: row.get(6)?,
        embedding: embedding_blob.map(|b| blob_to_f32_vec(&b)),
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
        last_accessed_at: parse_rfc3339(&last_accessed_at),
        access_count: row.get::<_, i64>(11)? as u64,
    })
}

fn parse_rfc3339(s: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_category(s: &str) -> MemoryCategory {
    match s {
        "fact" => MemoryCategory::Fact,
        "preference" => MemoryCategory::Preference,
        "decision" => MemoryCategory::Decision,
        "project" => MemoryCategory::Project,
        "entity" => MemoryCategory::Entity,
        "lesson" => MemoryCategory::Lesson,
        "conversation" => MemoryCategory::Conversation,
        _ => MemoryCategory::Other,
    }
}

fn parse_source(s: &str) -> MemorySource {
    match s {
        "auto" => MemorySource::Auto,
        "conversation" => MemorySource::Conversation,
        "compaction" => MemorySource::Compaction,
        _ => MemorySource::Manual,
    }
}
