//! SQL-backed task store (spec §4.8): tasks, their runs, agent-proposed
//! tasks awaiting approval, and an append-only transition log, with
//! foreign-key cascade from tasks down to the other three tables.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, TaskError};
pub use store::TaskStore;
pub use types::{NewProposal, NewRun, NewTask, ProposalChanges, RunCompletion, TaskChanges, TaskFilter};

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use taskforge_core::types::{NotifyPolicy, RunStatus, TaskKind, TaskStatus, TriggerMode};

    use super::*;

    fn store() -> TaskStore {
        TaskStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn base_new_task(created_by: &str) -> NewTask {
        NewTask {
            name: "water plants".into(),
            description: None,
            kind: TaskKind::Scheduled,
            prompt: "remind me to water the plants".into(),
            workflow: None,
            memory_context: None,
            memory_category: None,
            interval_ms: Some(3_600_000),
            cron_expression: None,
            business_hours: None,
            depends_on: None,
            event_source: None,
            event_config: None,
            trigger_mode: TriggerMode::Execute,
            persist_conversation: false,
            max_runs: None,
            notify: NotifyPolicy::OnChange,
            channel: "cli".into(),
            channel_target: "local".into(),
            created_by: created_by.into(),
        }
    }

    #[test]
    fn create_assigns_proposed_for_agent_and_active_for_user() {
        let s = store();
        let agent_task = s.create(base_new_task("agent")).unwrap();
        assert_eq!(agent_task.status, TaskStatus::Proposed);

        let user_task = s.create(base_new_task("user")).unwrap();
        assert_eq!(user_task.status, TaskStatus::Active);

        let transitions = s.get_transitions(agent_task.id).unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].from_status, "new");
        assert_eq!(transitions[0].to_status, "proposed");
    }

    #[test]
    fn update_records_transition_only_on_status_change() {
        let s = store();
        let task = s.create(base_new_task("user")).unwrap();

        let same_status = TaskChanges { status: Some(TaskStatus::Active), ..Default::default() };
        s.update(task.id, same_status, None).unwrap();
        assert_eq!(s.get_transitions(task.id).unwrap().len(), 1);

        let paused = TaskChanges { status: Some(TaskStatus::Paused), ..Default::default() };
        s.update(task.id, paused, Some("user requested pause")).unwrap();
        assert_eq!(s.get_transitions(task.id).unwrap().len(), 2);
    }

    #[test]
    fn reaching_max_runs_forces_done_status() {
        let s = store();
        let mut task = base_new_task("user");
        task.max_runs = Some(2);
        let task = s.create(task).unwrap();

        let changes = TaskChanges { run_count: Some(2), ..Default::default() };
        let updated = s.update(task.id, changes, None).unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
    }

    #[test]
    fn get_due_tasks_filters_by_status_kind_and_next_run_at() {
        let s = store();
        let task = s.create(base_new_task("user")).unwrap();
        let now = chrono::Utc::now();

        assert!(s.get_due_tasks(now).unwrap().is_empty());

        let changes = TaskChanges { next_run_at: Some(Some(now - chrono::Duration::seconds(1))), ..Default::default() };
        s.update(task.id, changes, None).unwrap();
        let due = s.get_due_tasks(now).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, task.id);
    }

    #[test]
    fn run_lifecycle_records_status_and_tokens() {
        let s = store();
        let task = s.create(base_new_task("user")).unwrap();
        let run = s.create_run(NewRun { task_id: task.id, trigger_info: Some("scheduled".into()) }).unwrap();
        assert_eq!(run.status, RunStatus::Running);

        let completed = s
            .complete_run(
                run.id,
                RunCompletion {
                    status: RunStatus::Success,
                    result: Some("watered".into()),
                    error: None,
                    error_kind: None,
                    tokens_used: 120,
                },
            )
            .unwrap();
        assert_eq!(completed.status, RunStatus::Success);
        assert_eq!(completed.tokens_used, 120);
        assert!(s.get_last_successful_run(task.id).unwrap().is_some());
    }

    #[test]
    fn proposal_rejection_is_remembered() {
        let s = store();
        let task = s.create(base_new_task("agent")).unwrap();
        let proposal = s
            .create_proposal(NewProposal { task_id: task.id, message_id: Some("msg-1".into()), channel: "cli".into(), channel_target: "local".into() })
            .unwrap();

        assert!(!s.was_recently_rejected(&task.name, 60_000).unwrap());
        s.update_proposal(proposal.id, ProposalChanges { status: Some(taskforge_core::types::ProposalStatus::Rejected) }).unwrap();
        assert!(s.was_recently_rejected(&task.name, 60_000).unwrap());
    }

    #[test]
    fn compact_deletes_old_runs_in_one_transaction() {
        let s = store();
        let task = s.create(base_new_task("user")).unwrap();
        let run = s.create_run(NewRun { task_id: task.id, trigger_info: None }).unwrap();
        s.complete_run(run.id, RunCompletion { status: RunStatus::Success, result: None, error: None, error_kind: None, tokens_used: 0 }).unwrap();

        // Fresh run: nothing old enough to compact away.
        let deleted = s.compact(30).unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(s.get_recent_runs(task.id, 10).unwrap().len(), 1);
    }

    #[test]
    fn cascading_delete_removes_runs_and_transitions() {
        let s = store();
        let task = s.create(base_new_task("user")).unwrap();
        s.create_run(NewRun { task_id: task.id, trigger_info: None }).unwrap();
        assert!(s.delete(task.id).unwrap());
        assert!(s.get(task.id).unwrap().is_none());
    }
}
