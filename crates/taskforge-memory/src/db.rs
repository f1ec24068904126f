use rusqlite::Connection;

/// Initialise memory tables. Safe to call on every startup (idempotent);
/// migrates in place per spec §6 when new columns appear.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    create_memories_table(conn)?;
    create_fts_index(conn)?;
    create_working_memory_table(conn)?;
    migrate_columns(conn)?;
    Ok(())
}

fn create_memories_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memories (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            key               TEXT NOT NULL UNIQUE,
            value             TEXT NOT NULL,
            content_type      TEXT NOT NULL DEFAULT 'text',
            category          TEXT NOT NULL DEFAULT 'other',
            source            TEXT NOT NULL DEFAULT 'manual',
            session_id        TEXT,
            image_path        TEXT,
            embedding         BLOB,
            embedding_dim     INTEGER,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL,
            last_accessed_at  TEXT NOT NULL,
            access_count      INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_memories_category ON memories(category);
        CREATE INDEX IF NOT EXISTS idx_memories_source ON memories(source);
        CREATE INDEX IF NOT EXISTS idx_memories_content_type ON memories(content_type);
        CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at);",
    )
}

/// FTS5 virtual table over key+value. `content=''` makes it external
/// content — synced manually on every write (see `store.rs`).
fn create_fts_index(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts
            USING fts5(key, value, content='memories', content_rowid='id');",
    )
}

fn create_working_memory_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS working_memory (
            key          TEXT PRIMARY KEY,
            value        TEXT NOT NULL,
            context      TEXT NOT NULL DEFAULT '',
            expires_at   TEXT NOT NULL,
            promote_flag INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_working_memory_expires
            ON working_memory(expires_at);",
    )
}

/// Guards against re-running `ALTER TABLE` on a column that already exists —
/// `rusqlite`/SQLite has no `ADD COLUMN IF NOT EXISTS`, so check `PRAGMA
/// table_info` first.
fn migrate_columns(conn: &Connection) -> rusqlite::Result<()> {
    let existing: Vec<String> = {
        let mut stmt = conn.prepare("PRAGMA table_info(memories)")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
        rows.filter_map(|r| r.ok()).collect()
    };

    let wanted: &[(&str, &str)] = &[
        ("session_id", "TEXT"),
        ("last_accessed_at", "TEXT"),
        ("access_count", "INTEGER NOT NULL DEFAULT 0"),
    ];
    for (name, ddl) in wanted {
        if !existing.iter().any(|c| c == name) {
            conn.execute(
                &format!("ALTER TABLE memories ADD COLUMN {name} {ddl}"),
                [],
            )?;
        }
    }
    Ok(())
}
