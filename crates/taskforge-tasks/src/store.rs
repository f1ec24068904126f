use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use taskforge_core::types::{
    FailureKind, MemoryCategory, NotifyPolicy, ProposalStatus, RunStatus, Task, TaskKind, TaskProposal,
    TaskRun, TaskStatus, TaskTransition, TriggerMode,
};
use uuid::Uuid;

use crate::error::{Result, TaskError};
use crate::types::{NewProposal, NewRun, NewTask, ProposalChanges, RunCompletion, TaskChanges, TaskFilter};

/// SQL-backed task store (spec §4.8). Single connection guarded by a mutex,
/// matching the concurrency model already used by [`taskforge_memory::MemoryStore`].
pub struct TaskStore {
    pub(crate) conn: Mutex<Connection>,
}

impl TaskStore {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Assigns status `proposed` when `created_by="agent"`, else `active`.
    /// Records the mandatory `new → initial_status` transition.
    pub fn create(&self, new: NewTask) -> Result<Task> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4();
        let now = Utc::now();
        let status = if new.created_by == "agent" { TaskStatus::Proposed } else { TaskStatus::Active };

        conn.execute(
            "INSERT INTO tasks (
                id, name, description, kind, status, prompt, workflow, memory_context,
                memory_category, interval_ms, cron_expression, business_hours, depends_on,
                event_source, event_config, trigger_mode, persist_conversation, next_run_at,
                last_run_at, run_count, max_runs, consecutive_failures, last_error_kind, notify,
                last_result_hash, channel, channel_target, created_by, created_at, updated_at
            ) VALUES (
                ?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,NULL,NULL,0,?18,0,NULL,
                ?19,NULL,?20,?21,?22,?23,?23
            )",
            params![
                id.to_string(),
                new.name,
                new.description,
                kind_str(new.kind),
                status_str(status),
                new.prompt,
                new.workflow.as_ref().map(|v| v.to_string()),
                new.memory_context.as_ref().map(|v| serde_json::to_string(v)).transpose()?,
                new.memory_category.map(category_str),
                new.interval_ms.map(|v| v as i64),
                new.cron_expression,
                new.business_hours,
                new.depends_on.map(|u| u.to_string()),
                new.event_source,
                new.event_config.as_ref().map(|v| v.to_string()),
                trigger_mode_str(new.trigger_mode),
                new.persist_conversation as i64,
                new.max_runs.map(|v| v as i64),
                notify_str(new.notify),
                new.channel,
                new.channel_target,
                new.created_by,
                now.to_rfc3339(),
            ],
        )?;

        self.insert_transition(&conn, id, "new", status_str(status), None)?;
        drop(conn);
        self.get(id)?.ok_or(TaskError::NotFound { id })
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Task>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(&select_task_sql("WHERE id = ?1"), params![id.to_string()], row_to_task)
            .optional()
            .map_err(TaskError::from)
    }

    /// Applies `changes`; records one transition if `status` differs from
    /// the current value. Identical-status updates record nothing.
    pub fn update(&self, id: Uuid, changes: TaskChanges, reason: Option<&str>) -> Result<Task> {
        let conn = self.conn.lock().unwrap();
        let current = conn
            .query_row(&select_task_sql("WHERE id = ?1"), params![id.to_string()], row_to_task)
            .optional()?
            .ok_or(TaskError::NotFound { id })?;

        let now = Utc::now();
        macro_rules! pick {
            ($changed:expr, $current:expr) => {
                $changed.unwrap_or($current)
            };
        }

        let name = changes.name.clone().unwrap_or(current.name.clone());
        let description = changes.description.clone().unwrap_or(current.description.clone());
        let status = pick!(changes.status, current.status);
        let prompt = changes.prompt.clone().unwrap_or(current.prompt.clone());
        let workflow = changes.workflow.clone().unwrap_or(current.workflow.clone());
        let interval_ms = changes.interval_ms.unwrap_or(current.interval_ms);
        let cron_expression = changes.cron_expression.clone().unwrap_or(current.cron_expression.clone());
        let business_hours = changes.business_hours.clone().unwrap_or(current.business_hours.clone());
        let next_run_at = changes.next_run_at.unwrap_or(current.next_run_at);
        let last_run_at = changes.last_run_at.unwrap_or(current.last_run_at);
        let run_count = pick!(changes.run_count, current.run_count);
        let max_runs = changes.max_runs.unwrap_or(current.max_runs);
        let consecutive_failures = pick!(changes.consecutive_failures, current.consecutive_failures);
        let last_error_kind = changes.last_error_kind.unwrap_or(current.last_error_kind);
        let notify = pick!(changes.notify, current.notify);
        let last_result_hash = changes.last_result_hash.clone().unwrap_or(current.last_result_hash.clone());

        // `run_count >= max_runs` forces a terminal `done` status regardless
        // of what the caller asked for (spec §3 invariant).
        let status = match max_runs {
            Some(limit) if run_count >= limit => TaskStatus::Done,
            _ => status,
        };

        conn.execute(
            "UPDATE tasks SET name=?1, description=?2, status=?3, prompt=?4, workflow=?5,
                interval_ms=?6, cron_expression=?7, business_hours=?8, next_run_at=?9,
                last_run_at=?10, run_count=?11, max_runs=?12, consecutive_failures=?13,
                last_error_kind=?14, notify=?15, last_result_hash=?16, updated_at=?17
             WHERE id=?18",
            params![
                name,
                description,
                status_str(status),
                prompt,
                workflow.as_ref().map(|v: &serde_json::Value| v.to_string()),
                interval_ms.map(|v| v as i64),
                cron_expression,
                business_hours,
                next_run_at.map(|d: DateTime<Utc>| d.to_rfc3339()),
                last_run_at.map(|d: DateTime<Utc>| d.to_rfc3339()),
                run_count as i64,
                max_runs.map(|v| v as i64),
                consecutive_failures as i64,
                last_error_kind.map(failure_kind_str),
                notify_str(notify),
                last_result_hash,
                now.to_rfc3339(),
                id.to_string(),
            ],
        )?;

        if status != current.status {
            self.insert_transition(&conn, id, &current.status.to_string(), &status.to_string(), reason)?;
        }

        drop(conn);
        self.get(id)?.ok_or(TaskError::NotFound { id })
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }

    pub fn list(&self, filter: Option<&TaskFilter>) -> Result<Vec<Task>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = select_task_sql("");
        let mut clauses = Vec::new();
        if let Some(f) = filter {
            if f.status.is_some() {
                clauses.push("status = ?".to_string());
            }
            if f.kind.is_some() {
                clauses.push("kind = ?".to_string());
            }
            if f.channel.is_some() {
                clauses.push("channel = ?".to_string());
            }
            if f.created_by.is_some() {
                clauses.push("created_by = ?".to_string());
            }
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let mut bound: Vec<String> = Vec::new();
        if let Some(f) = filter {
            if let Some(s) = f.status {
                bound.push(status_str(s).to_string());
            }
            if let Some(k) = f.kind {
                bound.push(kind_str(k).to_string());
            }
            if let Some(c) = &f.channel {
                bound.push(c.clone());
            }
            if let Some(c) = &f.created_by {
                bound.push(c.clone());
            }
        }
        let refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
        let rows = stmt.query_map(refs.as_slice(), row_to_task)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// `status=active AND kind IN (scheduled, oneshot) AND next_run_at IS NOT NULL
    /// AND next_run_at <= now`, ascending (spec §4.8 rule).
    pub fn get_due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let conn = self.conn.lock().unwrap();
        let sql = select_task_sql(
            "WHERE status = 'active' AND kind IN ('scheduled', 'oneshot')
             AND next_run_at IS NOT NULL AND next_run_at <= ?1
             ORDER BY next_run_at ASC",
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![now.to_rfc3339()], row_to_task)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn get_event_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.conn.lock().unwrap();
        let sql = select_task_sql("WHERE status = 'active' AND kind = 'event'");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_task)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn get_dependents(&self, id: Uuid) -> Result<Vec<Task>> {
        let conn = self.conn.lock().unwrap();
        let sql = select_task_sql("WHERE depends_on = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id.to_string()], row_to_task)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn active_count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tasks WHERE status = 'active'", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    pub fn create_run(&self, new: NewRun) -> Result<TaskRun> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO runs (id, task_id, started_at, completed_at, status, result, error,
                error_kind, trigger_info, tokens_used)
             VALUES (?1,?2,?3,NULL,?4,NULL,NULL,NULL,?5,0)",
            params![id.to_string(), new.task_id.to_string(), now.to_rfc3339(), run_status_str(RunStatus::Running), new.trigger_info],
        )?;
        drop(conn);
        self.get_run(id)?.ok_or(TaskError::NotFound { id })
    }

    pub fn complete_run(&self, id: Uuid, completion: RunCompletion) -> Result<TaskRun> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        conn.execute(
            "UPDATE runs SET completed_at=?1, status=?2, result=?3, error=?4, error_kind=?5, tokens_used=?6
             WHERE id=?7",
            params![
                now.to_rfc3339(),
                run_status_str(completion.status),
                completion.result,
                completion.error,
                completion.error_kind.map(failure_kind_str),
                completion.tokens_used as i64,
                id.to_string(),
            ],
        )?;
        drop(conn);
        self.get_run(id)?.ok_or(TaskError::NotFound { id })
    }

    fn get_run(&self, id: Uuid) -> Result<Option<TaskRun>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(&select_run_sql("WHERE id = ?1"), params![id.to_string()], row_to_run)
            .optional()
            .map_err(TaskError::from)
    }

    pub fn get_recent_runs(&self, task_id: Uuid, limit: usize) -> Result<Vec<TaskRun>> {
        let conn = self.conn.lock().unwrap();
        let sql = select_run_sql("WHERE task_id = ?1 ORDER BY started_at DESC LIMIT ?2");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![task_id.to_string(), limit as i64], row_to_run)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn get_last_successful_run(&self, task_id: Uuid) -> Result<Option<TaskRun>> {
        let conn = self.conn.lock().unwrap();
        let sql = select_run_sql("WHERE task_id = ?1 AND status = 'success' ORDER BY started_at DESC LIMIT 1");
        conn.query_row(&sql, params![task_id.to_string()], row_to_run).optional().map_err(TaskError::from)
    }

    pub fn create_proposal(&self, new: NewProposal) -> Result<TaskProposal> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO proposals (id, task_id, message_id, channel, channel_target, status, rejected_at, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,NULL,?7)",
            params![
                id.to_string(),
                new.task_id.to_string(),
                new.message_id,
                new.channel,
                new.channel_target,
                proposal_status_str(ProposalStatus::Pending),
                now.to_rfc3339(),
            ],
        )?;
        drop(conn);
        self.get_proposal(id)?.ok_or(TaskError::ProposalNotFound { id })
    }

    fn get_proposal(&self, id: Uuid) -> Result<Option<TaskProposal>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(&select_proposal_sql("WHERE id = ?1"), params![id.to_string()], row_to_proposal)
            .optional()
            .map_err(TaskError::from)
    }

    pub fn get_proposal_by_message(&self, message_id: &str) -> Result<Option<TaskProposal>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(&select_proposal_sql("WHERE message_id = ?1"), params![message_id], row_to_proposal)
            .optional()
            .map_err(TaskError::from)
    }

    pub fn update_proposal(&self, id: Uuid, changes: ProposalChanges) -> Result<TaskProposal> {
        let conn = self.conn.lock().unwrap();
        let current = conn
            .query_row(&select_proposal_sql("WHERE id = ?1"), params![id.to_string()], row_to_proposal)
            .optional()?
            .ok_or(TaskError::ProposalNotFound { id })?;
        let status = changes.status.unwrap_or(current.status);
        let rejected_at = if status == ProposalStatus::Rejected && current.rejected_at.is_none() {
            Some(Utc::now())
        } else {
            current.rejected_at
        };
        conn.execute(
            "UPDATE proposals SET status=?1, rejected_at=?2 WHERE id=?3",
            params![proposal_status_str(status), rejected_at.map(|d: DateTime<Utc>| d.to_rfc3339()), id.to_string()],
        )?;
        drop(conn);
        self.get_proposal(id)?.ok_or(TaskError::ProposalNotFound { id })
    }

    /// True if a proposal named `name` was rejected within the last
    /// `within_ms` milliseconds. Used to suppress re-proposing an idea the
    /// user just turned down.
    pub fn was_recently_rejected(&self, name: &str, within_ms: u64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let cutoff = (Utc::now() - chrono::Duration::milliseconds(within_ms as i64)).to_rfc3339();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM proposals p JOIN tasks t ON p.task_id = t.id
             WHERE t.name = ?1 AND p.status = 'rejected' AND p.rejected_at >= ?2",
            params![name, cutoff],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    fn insert_transition(
        &self,
        conn: &Connection,
        task_id: Uuid,
        from_status: &str,
        to_status: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO transitions (id, task_id, from_status, to_status, reason, timestamp)
             VALUES (?1,?2,?3,?4,?5,?6)",
            params![Uuid::new_v4().to_string(), task_id.to_string(), from_status, to_status, reason, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn record_transition(&self, task_id: Uuid, from_status: &str, to_status: &str, reason: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        self.insert_transition(&conn, task_id, from_status, to_status, reason)
    }

    pub fn get_transitions(&self, task_id: Uuid) -> Result<Vec<TaskTransition>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, task_id, from_status, to_status, reason, timestamp
             FROM transitions WHERE task_id = ?1 ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![task_id.to_string()], row_to_transition)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Deletes runs/proposals/transitions older than `max_age_days` inside a
    /// single transaction. Tasks themselves are never compacted away.
    pub fn compact(&self, max_age_days: i64) -> Result<u64> {
        let mut conn = self.conn.lock().unwrap();
        let cutoff = (Utc::now() - chrono::Duration::days(max_age_days)).to_rfc3339();
        let tx = conn.transaction()?;
        let mut deleted = 0u64;
        deleted += tx.execute("DELETE FROM runs WHERE started_at < ?1", params![cutoff])? as u64;
        deleted += tx.execute("DELETE FROM proposals WHERE created_at < ?1", params![cutoff])? as u64;
        deleted += tx.execute("DELETE FROM transitions WHERE timestamp < ?1", params![cutoff])? as u64;
        tx.commit()?;
        Ok(deleted)
    }
}

fn select_task_sql(tail: &str) -> String {
    format!(
        "SELECT id, name, description, kind, status, prompt, workflow, memory_context,
                memory_category, interval_ms, cron_expression, business_hours, depends_on,
                event_source, event_config, trigger_mode, persist_conversation, next_run_at,
                last_run_at, run_count, max_runs, consecutive_failures, last_error_kind, notify,
                last_result_hash, channel, channel_target, created_by, created_at, updated_at
         FROM tasks {tail}"
    )
}

fn select_run_sql(tail: &str) -> String {
    format!(
        "SELECT id, task_id, started_at, completed_at, status, result, error, error_kind,
                trigger_info, tokens_used
         FROM runs {tail}"
    )
}

fn select_proposal_sql(tail: &str) -> String {
    format!("SELECT id, task_id, message_id, channel, channel_target, status, rejected_at, created_at FROM proposals {tail}")
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let id: String = row.get(0)?;
    let kind_s: String = row.get(3)?;
    let status_s: String = row.get(4)?;
    let workflow_s: Option<String> = row.get(6)?;
    let memory_context_s: Option<String> = row.get(7)?;
    let memory_category_s: Option<String> = row.get(8)?;
    let depends_on_s: Option<String> = row.get(12)?;
    let event_config_s: Option<String> = row.get(14)?;
    let trigger_mode_s: String = row.get(15)?;
    let next_run_at_s: Option<String> = row.get(17)?;
    let last_run_at_s: Option<String> = row.get(18)?;
    let last_error_kind_s: Option<String> = row.get(22)?;
    let notify_s: String = row.get(23)?;
    let channel: String = row.get(25)?;
    let channel_target: String = row.get(26)?;
    let created_at: String = row.get(28)?;
    let updated_at: String = row.get(29)?;

    Ok(Task {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        name: row.get(1)?,
        description: row.get(2)?,
        kind: parse_kind(&kind_s),
        status: parse_status(&status_s),
        prompt: row.get(5)?,
        workflow: workflow_s.and_then(|s| serde_json::from_str(&s).ok()),
        memory_context: memory_context_s.and_then(|s| serde_json::from_str(&s).ok()),
        memory_category: memory_category_s.as_deref().map(parse_category),
        interval_ms: row.get::<_, Option<i64>>(9)?.map(|v| v as u64),
        cron_expression: row.get(10)?,
        business_hours: row.get(11)?,
        depends_on: depends_on_s.and_then(|s| Uuid::parse_str(&s).ok()),
        event_source: row.get(13)?,
        event_config: event_config_s.and_then(|s| serde_json::from_str(&s).ok()),
        trigger_mode: parse_trigger_mode(&trigger_mode_s),
        persist_conversation: row.get::<_, i64>(16)? != 0,
        next_run_at: next_run_at_s.map(|s| parse_rfc3339(&s)),
        last_run_at: last_run_at_s.map(|s| parse_rfc3339(&s)),
        run_count: row.get::<_, i64>(19)? as u64,
        max_runs: row.get::<_, Option<i64>>(20)?.map(|v| v as u64),
        consecutive_failures: row.get::<_, i64>(21)? as u32,
        last_error_kind: last_error_kind_s.as_deref().map(parse_failure_kind),
        notify: parse_notify(&notify_s),
        last_result_hash: row.get(24)?,
        channel,
        channel_target,
        created_by: row.get(27)?,
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
    })
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRun> {
    let id: String = row.get(0)?;
    let task_id: String = row.get(1)?;
    let started_at: String = row.get(2)?;
    let completed_at_s: Option<String> = row.get(3)?;
    let status_s: String = row.get(4)?;
    let error_kind_s: Option<String> = row.get(7)?;

    Ok(TaskRun {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        task_id: Uuid::parse_str(&task_id).unwrap_or_default(),
        started_at: parse_rfc3339(&started_at),
        completed_at: completed_at_s.map(|s| parse_rfc3339(&s)),
        status: parse_run_status(&status_s),
        result: row.get(5)?,
        error: row.get(6)?,
        error_kind: error_kind_s.as_deref().map(parse_failure_kind),
        trigger_info: row.get(8)?,
        tokens_used: row.get::<_, i64>(9)? as u64,
    })
}

fn row_to_proposal(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskProposal> {
    let id: String = row.get(0)?;
    let task_id: String = row.get(1)?;
    let status_s: String = row.get(5)?;
    let rejected_at_s: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;

    Ok(TaskProposal {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        task_id: Uuid::parse_str(&task_id).unwrap_or_default(),
        message_id: row.get(2)?,
        channel: row.get(3)?,
        channel_target: row.get(4)?,
        status: parse_proposal_status(&status_s),
        rejected_at: rejected_at_s.map(|s| parse_rfc3339(&s)),
        created_at: parse_rfc3339(&created_at),
    })
}

fn row_to_transition(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskTransition> {
    let id: String = row.get(0)?;
    let task_id: String = row.get(1)?;
    let timestamp: String = row.get(5)?;
    Ok(TaskTransition {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        task_id: Uuid::parse_str(&task_id).unwrap_or_default(),
        from_status: row.get(2)?,
        to_status: row.get(3)?,
        reason: row.get(4)?,
        timestamp: parse_rfc3339(&timestamp),
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

fn kind_str(k: TaskKind) -> &'static str {
    match k {
        TaskKind::Scheduled => "scheduled",
        TaskKind::Event => "event",
        TaskKind::Oneshot => "oneshot",
    }
}

fn parse_kind(s: &str) -> TaskKind {
    match s {
        "event" => TaskKind::Event,
        "oneshot" => TaskKind::Oneshot,
        _ => TaskKind::Scheduled,
    }
}

fn status_str(s: TaskStatus) -> &'static str {
    match s {
        TaskStatus::Proposed => "proposed",
        TaskStatus::Active => "active",
        TaskStatus::Paused => "paused",
        TaskStatus::Done => "done",
        TaskStatus::Failed => "failed",
    }
}

fn parse_status(s: &str) -> TaskStatus {
    s.parse().unwrap_or(TaskStatus::Failed)
}

fn trigger_mode_str(t: TriggerMode) -> &'static str {
    match t {
        TriggerMode::Execute => "execute",
        TriggerMode::CreateTask => "create_task",
    }
}

fn parse_trigger_mode(s: &str) -> TriggerMode {
    match s {
        "create_task" => TriggerMode::CreateTask,
        _ => TriggerMode::Execute,
    }
}

fn notify_str(n: NotifyPolicy) -> &'static str {
    match n {
        NotifyPolicy::Always => "always",
        NotifyPolicy::OnChange => "on_change",
        NotifyPolicy::OnFailure => "on_failure",
        NotifyPolicy::Never => "never",
    }
}

fn parse_notify(s: &str) -> NotifyPolicy {
    match s {
        "always" => NotifyPolicy::Always,
        "on_failure" => NotifyPolicy::OnFailure,
        "never" => NotifyPolicy::Never,
        _ => NotifyPolicy::OnChange,
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

fn failure_kind_str(f: FailureKind) -> String {
    f.to_string()
}

fn parse_failure_kind(s: &str) -> FailureKind {
    match s {
        "rate_limit" => FailureKind::RateLimit,
        "auth" => FailureKind::Auth,
        "timeout" => FailureKind::Timeout,
        "context_overflow" => FailureKind::ContextOverflow,
        "transient" => FailureKind::Transient,
        _ => FailureKind::Unknown,
    }
}

fn run_status_str(s: RunStatus) -> &'static str {
    match s {
        RunStatus::Running => "running",
        RunStatus::Success => "success",
        RunStatus::Failure => "failure",
        RunStatus::Skipped => "skipped",
    }
}

fn parse_run_status(s: &str) -> RunStatus {
    match s {
        "success" => RunStatus::Success,
        "failure" => RunStatus::Failure,
        "skipped" => RunStatus::Skipped,
        _ => RunStatus::Running,
    }
}

fn proposal_status_str(s: ProposalStatus) -> &'static str {
    match s {
        ProposalStatus::Pending => "pending",
        ProposalStatus::Approved => "approved",
        ProposalStatus::Rejected => "rejected",
    }
}

fn parse_proposal_status(s: &str) -> ProposalStatus {
    match s {
        "approved" => ProposalStatus::Approved,
        "rejected" => ProposalStatus::Rejected,
        _ => ProposalStatus::Pending,
    }
}
