use rusqlite::Connection;

/// Initialise the task-store schema in `conn`. Idempotent; safe to call on
/// every startup. Foreign keys cascade from `tasks` down to
/// `runs`/`proposals`/`transitions` (spec §4.8).
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id                    TEXT    NOT NULL PRIMARY KEY,
            name                  TEXT    NOT NULL,
            description           TEXT,
            kind                  TEXT    NOT NULL,
            status                TEXT    NOT NULL,
            prompt                TEXT    NOT NULL,
            workflow              TEXT,
            memory_context        TEXT,
            memory_category       TEXT,
            interval_ms           INTEGER,
            cron_expression       TEXT,
            business_hours        TEXT,
            depends_on            TEXT REFERENCES tasks(id),
            event_source          TEXT,
            event_config          TEXT,
            trigger_mode          TEXT    NOT NULL DEFAULT 'execute',
            persist_conversation  INTEGER NOT NULL DEFAULT 0,
            next_run_at           TEXT,
            last_run_at           TEXT,
            run_count             INTEGER NOT NULL DEFAULT 0,
            max_runs              INTEGER,
            consecutive_failures  INTEGER NOT NULL DEFAULT 0,
            last_error_kind       TEXT,
            notify                TEXT    NOT NULL DEFAULT 'on_change',
            last_result_hash      TEXT,
            channel               TEXT    NOT NULL,
            channel_target        TEXT    NOT NULL,
            created_by            TEXT    NOT NULL,
            created_at            TEXT    NOT NULL,
            updated_at            TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
        CREATE INDEX IF NOT EXISTS idx_tasks_next_run_at ON tasks(next_run_at);
        CREATE INDEX IF NOT EXISTS idx_tasks_event_source ON tasks(event_source);
        CREATE INDEX IF NOT EXISTS idx_tasks_depends_on ON tasks(depends_on);

        CREATE TABLE IF NOT EXISTS runs (
            id             TEXT    NOT NULL PRIMARY KEY,
            task_id        TEXT    NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            started_at     TEXT    NOT NULL,
            completed_at   TEXT,
            status         TEXT    NOT NULL,
            result         TEXT,
            error          TEXT,
            error_kind     TEXT,
            trigger_info   TEXT,
            tokens_used    INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_runs_task_id ON runs(task_id);
        CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at);

        CREATE TABLE IF NOT EXISTS proposals (
            id             TEXT    NOT NULL PRIMARY KEY,
            task_id        TEXT    NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            message_id     TEXT,
            channel        TEXT    NOT NULL,
            channel_target TEXT    NOT NULL,
            status         TEXT    NOT NULL,
            rejected_at    TEXT,
            created_at     TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_proposals_task_id ON proposals(task_id);
        CREATE INDEX IF NOT EXISTS idx_proposals_message_id ON proposals(message_id);

        CREATE TABLE IF NOT EXISTS transitions (
            id          TEXT    NOT NULL PRIMARY KEY,
            task_id     TEXT    NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            from_status TEXT    NOT NULL,
            to_status   TEXT    NOT NULL,
            reason      TEXT,
            timestamp   TEXT    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_transitions_task_id ON transitions(task_id);
        ",
    )
}
