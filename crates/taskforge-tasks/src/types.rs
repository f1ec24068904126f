use taskforge_core::types::{
    FailureKind, MemoryCategory, NotifyPolicy, ProposalStatus, TaskKind, TaskStatus, TriggerMode,
};
use uuid::Uuid;

/// Fields to create a task with. `id`/`created_at`/`updated_at`/`status` are
/// assigned by the store (spec §4.8 rule: `proposed` when
/// `created_by="agent"`, else `active`).
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub description: Option<String>,
    pub kind: TaskKind,
    pub prompt: String,
    pub workflow: Option<serde_json::Value>,
    pub memory_context: Option<Vec<String>>,
    pub memory_category: Option<MemoryCategory>,
    pub interval_ms: Option<u64>,
    pub cron_expression: Option<String>,
    pub business_hours: Option<String>,
    pub depends_on: Option<Uuid>,
    pub event_source: Option<String>,
    pub event_config: Option<serde_json::Value>,
    pub trigger_mode: TriggerMode,
    pub persist_conversation: bool,
    pub max_runs: Option<u64>,
    pub notify: NotifyPolicy,
    pub channel: String,
    pub channel_target: String,
    pub created_by: String,
}

/// Sparse patch for `update`. `None` leaves a field untouched; fields that
/// are themselves optional use a double-`Option` (`Some(None)` clears it).
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub prompt: Option<String>,
    pub workflow: Option<Option<serde_json::Value>>,
    pub interval_ms: Option<Option<u64>>,
    pub cron_expression: Option<Option<String>>,
    pub business_hours: Option<Option<String>>,
    pub next_run_at: Option<Option<chrono::DateTime<chrono::Utc>>>,
    pub last_run_at: Option<Option<chrono::DateTime<chrono::Utc>>>,
    pub run_count: Option<u64>,
    pub max_runs: Option<Option<u64>>,
    pub consecutive_failures: Option<u32>,
    pub last_error_kind: Option<Option<FailureKind>>,
    pub notify: Option<NotifyPolicy>,
    pub last_result_hash: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub kind: Option<TaskKind>,
    pub channel: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRun {
    pub task_id: Uuid,
    pub trigger_info: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub status: taskforge_core::types::RunStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<FailureKind>,
    pub tokens_used: u64,
}

#[derive(Debug, Clone)]
pub struct NewProposal {
    pub task_id: Uuid,
    pub message_id: Option<String>,
    pub channel: String,
    pub channel_target: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProposalChanges {
    pub status: Option<ProposalStatus>,
}
