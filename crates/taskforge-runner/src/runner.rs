//! The task runner (spec §4.11): a single polling loop — `tick_interval_ms`
//! default, `watch::Receiver<bool>` shutdown — generalized from
//! `SchedulerEngine::{run, tick}`'s "fire due jobs" shape to the full
//! execute/retry/notify/cascade state machine.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use taskforge_agent::{LlmProvider, RunOptions, ToolRegistry};
use taskforge_context::FitConfig;
use taskforge_core::config::{OrchestrationConfig, RoutingConfig};
use taskforge_core::types::{AgentContext, EventPayload, NotifyPolicy, TaskKind, TaskStatus};
use taskforge_events::EventSource;
use taskforge_memory::extraction::{parse_extractions, FactExtractor};
use taskforge_memory::types::{MemoryFilters, SetOptions};
use taskforge_memory::MemoryStore;
use taskforge_scheduler::{calculate_next_run, ScheduleInput};
use taskforge_tasks::{NewRun, NewTask, RunCompletion, TaskChanges, TaskStore};
use taskforge_tokenizer::Tokenizer;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::discovery::Discovery;
use crate::error::Result;
use crate::executor::{NoopWorkflowExecutor, WorkflowExecutor};
use crate::failure::{classify_error, retry_policy};
use crate::notify::{NullNotifier, Notifier};
use crate::queue::{DedupeTracker, EventQueue, QueuedEvent};

const MEMORY_RELEVANCE_THRESHOLD: f32 = 0.2;
const MEMORY_RETRIEVAL_LIMIT: usize = 5;

/// Everything the runner needs that isn't owned data: the provider stack,
/// tool registry, and tunables. Constructed once and handed to [`Runner::new`].
pub struct RunnerDeps {
    pub local_provider: Arc<dyn LlmProvider>,
    pub remote_provider: Option<Arc<dyn LlmProvider>>,
    pub tools: Arc<ToolRegistry>,
    pub tokenizer: Arc<dyn Tokenizer>,
    pub routing_config: RoutingConfig,
    pub fit_config: FitConfig,
    pub workflow_executor: Arc<dyn WorkflowExecutor>,
    pub notifier: Arc<dyn Notifier>,
    pub extractor: Option<Arc<dyn FactExtractor>>,
    pub workspace_dir: PathBuf,
}

impl RunnerDeps {
    /// Minimal deps for tests: no remote provider, no-op workflow executor,
    /// null notifier, no extractor.
    pub fn minimal(local_provider: Arc<dyn LlmProvider>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            local_provider,
            remote_provider: None,
            tools: Arc::new(ToolRegistry::new()),
            tokenizer,
            routing_config: RoutingConfig::default(),
            fit_config: FitConfig::default(),
            workflow_executor: Arc::new(NoopWorkflowExecutor),
            notifier: Arc::new(NullNotifier),
            extractor: None,
            workspace_dir: PathBuf::from("."),
        }
    }
}

struct ExecutionOutcome {
    content: String,
    tokens_used: u64,
}

/// Guard that clears `is_executing`/`current_task_id` on drop, so every
/// return path — success, failure, timeout, or an early `?` — releases the
/// serialization lock.
struct ExecutingGuard<'a> {
    runner: &'a Runner,
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.runner.is_executing.store(false, Ordering::SeqCst);
        *self.runner.current_task_id.lock().unwrap() = None;
    }
}

pub struct Runner {
    store: Arc<TaskStore>,
    memory: Arc<MemoryStore>,
    deps: RunnerDeps,
    orchestration: OrchestrationConfig,
    discovery: Discovery,
    queue: EventQueue,
    dedupe: DedupeTracker,
    event_sources: DashMap<Uuid, Arc<dyn EventSource>>,
    is_executing: AtomicBool,
    current_task_id: Mutex<Option<Uuid>>,
    sessions: DashMap<Uuid, AgentContext>,
    last_interaction_at: Mutex<DateTime<Utc>>,
}

impl Runner {
    pub fn new(store: Arc<TaskStore>, memory: Arc<MemoryStore>, deps: RunnerDeps, orchestration: OrchestrationConfig) -> Arc<Self> {
        let discovery = Discovery::new(orchestration.discovery_interval_ms, orchestration.idle_threshold_ms);
        Arc::new(Self {
            store,
            memory,
            deps,
            orchestration,
            discovery,
            queue: EventQueue::new(),
            dedupe: DedupeTracker::new(),
            event_sources: DashMap::new(),
            is_executing: AtomicBool::new(false),
            current_task_id: Mutex::new(None),
            sessions: DashMap::new(),
            last_interaction_at: Mutex::new(Utc::now()),
        })
    }

    pub fn note_interaction(&self, at: DateTime<Utc>) {
        *self.last_interaction_at.lock().unwrap() = at;
    }

    pub fn is_executing(&self) -> bool {
        self.is_executing.load(Ordering::SeqCst)
    }

    /// Main loop. Polls every `tick_interval_ms` until `shutdown` broadcasts
    /// `true`, mirroring `SchedulerEngine::run`'s select-based shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("task runner started");
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(self.orchestration.tick_interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.clone().tick().await {
                        error!("runner tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("task runner shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One tick: pop a queued event, else execute the earliest due task, else
    /// give discovery a chance. No-op if a task is already executing.
    pub async fn tick(self: Arc<Self>) -> Result<()> {
        if self.is_executing() {
            return Ok(());
        }

        if let Some(event) = self.queue.pop_oldest() {
            self.execute(event.task_id, Some(event.payload)).await?;
            return Ok(());
        }

        let now = Utc::now();
        for task in self.store.get_due_tasks(now)? {
            if let Some(expr) = &task.business_hours {
                let bh = taskforge_scheduler::parse_business_hours(expr)?;
                if !bh.is_within(now) {
                    if let Some(next_start) = bh.next_start(now - chrono::Duration::seconds(1)) {
                        self.store.update(
                            task.id,
                            TaskChanges { next_run_at: Some(Some(next_start)), ..Default::default() },
                            Some("rescheduled: outside business hours"),
                        )?;
                    }
                    continue;
                }
            }
            self.execute(task.id, None).await?;
            return Ok(());
        }

        let last_interaction_at = *self.last_interaction_at.lock().unwrap();
        self.discovery
            .maybe_fire(
                now,
                last_interaction_at,
                self.deps.local_provider.as_ref(),
                &self.deps.tools,
                self.deps.tokenizer.as_ref(),
                &self.deps.routing_config,
                &self.deps.fit_config,
            )
            .await?;
        Ok(())
    }

    /// Registers an event source for `task_id`, wiring its callback into this
    /// runner's dedupe/queue/dispatch logic (spec §4.11 "event handling").
    pub async fn register_event_source(self: &Arc<Self>, task_id: Uuid, source: Arc<dyn EventSource>) -> Result<()> {
        let runner = self.clone();
        if let Err(e) = source
            .start(Arc::new(move |payload: EventPayload| {
                runner.clone().on_event(task_id, payload);
            }))
            .await
        {
            warn!(task_id = %task_id, error = %e, "event source failed to start");
            return Ok(());
        }
        self.event_sources.insert(task_id, source);
        Ok(())
    }

    pub async fn unregister_event_source(&self, task_id: Uuid) {
        if let Some((_, source)) = self.event_sources.remove(&task_id) {
            if let Err(e) = source.stop().await {
                warn!(task_id = %task_id, error = %e, "event source failed to stop cleanly");
            }
        }
    }

    /// Invoked synchronously from an event source's callback. Applies dedupe,
    /// materializes a one-shot task for `create_task` triggers, and otherwise
    /// either queues or directly spawns execution depending on whether the
    /// runner is busy (spec §4.11 "event handling").
    fn on_event(self: Arc<Self>, task_id: Uuid, payload: EventPayload) {
        let now = Utc::now();
        if !self.dedupe.accept(task_id, now, self.orchestration.event_dedupe_ms) {
            return;
        }

        let task = match self.store.get(task_id) {
            Ok(Some(t)) if t.status == TaskStatus::Active => t,
            _ => return,
        };

        if task.trigger_mode == taskforge_core::types::TriggerMode::CreateTask {
            let slug = slugify(&payload.summary);
            let name = format!("{}/{}-{}", task.name, slug, now.timestamp());
            let prompt = format!("[Triggered by: {} — {}]\n{}\n\n{}", payload.source, payload.summary, payload.data, task.prompt);
            let new = NewTask {
                name,
                description: None,
                kind: TaskKind::Oneshot,
                prompt,
                workflow: None,
                memory_context: task.memory_context.clone(),
                memory_category: task.memory_category,
                interval_ms: None,
                cron_expression: None,
                business_hours: None,
                depends_on: None,
                event_source: None,
                event_config: None,
                trigger_mode: taskforge_core::types::TriggerMode::Execute,
                persist_conversation: false,
                max_runs: Some(1),
                notify: task.notify,
                channel: task.channel.clone(),
                channel_target: task.channel_target.clone(),
                created_by: "system".into(),
            };
            match self.store.create(new) {
                Ok(created) => {
                    let _ = self.store.update(
                        created.id,
                        TaskChanges { next_run_at: Some(Some(now)), ..Default::default() },
                        None,
                    );
                }
                Err(e) => warn!(error = %e, "failed to materialize triggered one-shot task"),
            }
            return;
        }

        if self.is_executing() {
            self.queue.push(QueuedEvent { task_id, payload });
        } else {
            tokio::spawn(async move {
                if let Err(e) = self.execute(task_id, Some(payload)).await {
                    error!(task_id = %task_id, error = %e, "event-triggered execution failed");
                }
            });
        }
    }

    /// Execute one `(task, event?)` under `task_timeout_ms`, updating task
    /// state, recording the run, notifying, and cascading to dependents
    /// (spec §4.11 steps 1-8).
    async fn execute(self: &Arc<Self>, task_id: Uuid, event: Option<EventPayload>) -> Result<()> {
        let Some(task) = self.store.get(task_id)? else { return Ok(()) };

        self.is_executing.store(true, Ordering::SeqCst);
        *self.current_task_id.lock().unwrap() = Some(task_id);
        let _guard = ExecutingGuard { runner: self.as_ref() };

        let run_row = self.store.create_run(NewRun { task_id, trigger_info: event.as_ref().map(|e| e.summary.clone()) })?;
        let now_start = Utc::now();
        let timeout = std::time::Duration::from_millis(self.orchestration.task_timeout_ms);

        let work = self.run_task_work(&task, event.as_ref());
        let outcome = match tokio::time::timeout(timeout, work).await {
            Ok(Ok(o)) => Ok(o),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("task timed out after {}ms", self.orchestration.task_timeout_ms)),
        };

        match outcome {
            Ok(o) => self.on_success(&task, run_row.id, o).await?,
            Err(message) => self.on_failure(&task, run_row.id, message, now_start).await?,
        }
        Ok(())
    }

    async fn run_task_work(&self, task: &taskforge_core::types::Task, event: Option<&EventPayload>) -> anyhow::Result<ExecutionOutcome> {
        let mut workflow_context = String::new();
        if let Some(workflow) = &task.workflow {
            let outcome = self.deps.workflow_executor.execute(workflow, &task.prompt).await;
            if outcome.success {
                return Ok(ExecutionOutcome { content: outcome.output, tokens_used: 0 });
            }
            workflow_context = outcome.output;
        }

        let mut preloaded = String::new();
        if let Some(keys) = &task.memory_context {
            for key in keys {
                if let Some(rec) = self.memory.get(key)? {
                    preloaded.push_str(&format!("- {}: {}\n", rec.key, rec.value));
                }
            }
        }

        let filters = MemoryFilters { category: task.memory_category, ..Default::default() };
        let mut retrieved = String::new();
        for hit in self.memory.search_hybrid(
            &task.prompt,
            MEMORY_RETRIEVAL_LIMIT,
            self.memory_fts_weight(),
            self.memory_vector_weight(),
            &filters,
            None,
        )? {
            if hit.score >= MEMORY_RELEVANCE_THRESHOLD {
                retrieved.push_str(&format!("- {}: {}\n", hit.record.key, hit.record.value));
            }
        }
        if let Some(e) = event {
            for hit in self.memory.search_hybrid(&e.summary, MEMORY_RETRIEVAL_LIMIT, self.memory_fts_weight(), self.memory_vector_weight(), &filters, None)? {
                if hit.score >= MEMORY_RELEVANCE_THRESHOLD {
                    retrieved.push_str(&format!("- {}: {}\n", hit.record.key, hit.record.value));
                }
            }
        }

        let mut user_message = String::new();
        if let Some(e) = event {
            user_message.push_str(&format!("[Event: {} — {}]\n{}\n\n", e.source, e.summary, e.data));
        }
        if !workflow_context.is_empty() {
            user_message.push_str(&format!("[Workflow output]\n{workflow_context}\n\n"));
        }
        if !preloaded.is_empty() {
            user_message.push_str(&format!("[Memory context]\n{preloaded}\n\n"));
        }
        if !retrieved.is_empty() {
            user_message.push_str(&format!("[Related memory]\n{retrieved}\n\n"));
        }
        user_message.push_str(&task.prompt);

        let session_id = format!("task:{}", task.id);
        let mut ctx = if task.persist_conversation {
            self.sessions.entry(task.id).or_insert_with(|| AgentContext {
                session_id: session_id.clone(),
                workspace_dir: self.deps.workspace_dir.clone(),
                system_prompt: "You are a scheduled task agent.".into(),
                messages: Vec::new(),
            });
            self.sessions.get(&task.id).unwrap().clone()
        } else {
            AgentContext {
                session_id,
                workspace_dir: self.deps.workspace_dir.clone(),
                system_prompt: "You are a scheduled task agent.".into(),
                messages: Vec::new(),
            }
        };

        let result = taskforge_agent::run(
            &mut ctx,
            &user_message,
            self.deps.local_provider.as_ref(),
            self.deps.remote_provider.as_deref(),
            &self.deps.tools,
            self.deps.tokenizer.as_ref(),
            &self.deps.routing_config,
            &self.deps.fit_config,
            RunOptions::default(),
        )
        .await?;

        if task.persist_conversation {
            self.sessions.insert(task.id, ctx);
        }

        let transcript = format!("{}\n\n{}", user_message, result.content);
        self.spawn_background_extraction(task, &transcript, &session_id_for(task.id));

        Ok(ExecutionOutcome {
            content: result.content,
            tokens_used: (result.usage.input_tokens + result.usage.output_tokens) as u64,
        })
    }

    fn memory_fts_weight(&self) -> f32 {
        0.3
    }
    fn memory_vector_weight(&self) -> f32 {
        0.7
    }

    async fn on_success(&self, task: &taskforge_core::types::Task, run_id: Uuid, outcome: ExecutionOutcome) -> Result<()> {
        let now = Utc::now();
        let hash = result_hash(&outcome.content);
        let changed = task.last_result_hash.as_deref() != Some(hash.as_str());

        let mut changes = TaskChanges {
            last_run_at: Some(Some(now)),
            run_count: Some(task.run_count + 1),
            consecutive_failures: Some(0),
            last_error_kind: Some(None),
            last_result_hash: Some(Some(hash)),
            ..Default::default()
        };
        if task.kind == TaskKind::Scheduled {
            let next = calculate_next_run(&ScheduleInput {
                interval_ms: task.interval_ms,
                cron: task.cron_expression.as_deref(),
                business_hours: task.business_hours.as_deref(),
                now: Some(now),
            })?;
            changes.next_run_at = Some(next);
        }

        let updated = self.store.update(task.id, changes, None)?;
        self.store.complete_run(
            run_id,
            RunCompletion { status: taskforge_core::types::RunStatus::Success, result: Some(outcome.content.clone()), error: None, error_kind: None, tokens_used: outcome.tokens_used },
        )?;

        if updated.status == TaskStatus::Done {
            self.unregister_event_source(task.id).await;
        }

        let should_notify = match task.notify {
            NotifyPolicy::Always => true,
            NotifyPolicy::OnChange => changed,
            NotifyPolicy::OnFailure | NotifyPolicy::Never => false,
        };
        if should_notify {
            self.deps.notifier.notify(&task.channel, &task.channel_target, &format!("Task '{}' completed: {}", task.name, outcome.content)).await;
        }

        self.cascade_to_dependents(task.id, &task.name, now).await?;
        Ok(())
    }

    async fn on_failure(&self, task: &taskforge_core::types::Task, run_id: Uuid, message: String, _started_at: DateTime<Utc>) -> Result<()> {
        let kind = classify_error(&message);
        let policy = retry_policy(kind, task.consecutive_failures);
        let consecutive_failures = task.consecutive_failures + 1;

        self.store.complete_run(
            run_id,
            RunCompletion { status: taskforge_core::types::RunStatus::Failure, result: None, error: Some(message.clone()), error_kind: Some(kind), tokens_used: 0 },
        )?;

        if policy.should_pause {
            self.store.update(
                task.id,
                TaskChanges { status: Some(TaskStatus::Paused), consecutive_failures: Some(consecutive_failures), last_error_kind: Some(Some(kind)), ..Default::default() },
                Some(&format!("paused: {kind} — {message}")),
            )?;
            self.unregister_event_source(task.id).await;
            self.deps
                .notifier
                .notify(&task.channel, &task.channel_target, &format!("Task '{}' paused ({kind}): {message}", task.name))
                .await;
        } else {
            let mut changes = TaskChanges {
                consecutive_failures: Some(consecutive_failures),
                last_error_kind: Some(Some(kind)),
                ..Default::default()
            };
            if task.kind == TaskKind::Scheduled {
                changes.next_run_at = Some(Some(Utc::now() + chrono::Duration::milliseconds(policy.backoff_ms as i64)));
            }
            self.store.update(task.id, changes, Some("retry scheduled"))?;

            if matches!(task.notify, NotifyPolicy::OnFailure | NotifyPolicy::Always) {
                self.deps
                    .notifier
                    .notify(&task.channel, &task.channel_target, &format!("Task '{}' failed ({kind}), retrying: {message}", task.name))
                    .await;
            }
        }
        Ok(())
    }

    async fn cascade_to_dependents(&self, parent_id: Uuid, parent_name: &str, now: DateTime<Utc>) -> Result<()> {
        for dep in self.store.get_dependents(parent_id)? {
            if dep.status != TaskStatus::Active {
                continue;
            }
            match dep.kind {
                TaskKind::Scheduled | TaskKind::Oneshot => {
                    self.store.update(dep.id, TaskChanges { next_run_at: Some(Some(now)), ..Default::default() }, None)?;
                }
                TaskKind::Event => {
                    self.queue.push(QueuedEvent {
                        task_id: dep.id,
                        payload: EventPayload {
                            source: "dependency".into(),
                            summary: format!("{parent_name} completed"),
                            data: serde_json::json!({"parent_task_id": parent_id}),
                        },
                    });
                }
            }
        }
        Ok(())
    }

    fn spawn_background_extraction(&self, task: &taskforge_core::types::Task, transcript: &str, session_id: &str) {
        let Some(extractor) = self.deps.extractor.clone() else { return };
        let memory = self.memory.clone();
        let transcript = transcript.to_string();
        let session_id = session_id.to_string();
        let task_name = task.name.clone();

        tokio::spawn(async move {
            let auto_prefix = format!("auto/task/{task_name}/");
            if let Err(e) = store_prefixed_extraction(&extractor, &memory, &transcript, Some(&session_id), &auto_prefix, 5).await {
                warn!(error = %e, "background fact extraction failed");
            }

            let lesson_prefix = format!("lesson/task/{task_name}/");
            if let Err(e) = store_prefixed_extraction(&extractor, &memory, &transcript, Some(&session_id), &lesson_prefix, 2).await {
                warn!(error = %e, "background lesson extraction failed");
            }
        });
    }
}

/// Runs `extractor` directly (rather than `extract_and_store`, which would
/// write each item's raw key) so every stored key can be prefixed per
/// spec §4.11 step 8 (`auto/task/<name>/<key>`, `lesson/task/<name>/<key>`).
async fn store_prefixed_extraction(
    extractor: &dyn FactExtractor,
    store: &MemoryStore,
    transcript: &str,
    session_id: Option<&str>,
    prefix: &str,
    max_items: usize,
) -> taskforge_memory::Result<usize> {
    let raw = match extractor.complete("Extract durable facts from the transcript below as a JSON array of {key,value,category}.", transcript, 512).await {
        Ok(r) => r,
        Err(_) => return Ok(0),
    };
    let items = parse_extractions(&raw, max_items);
    let mut stored = 0;
    for item in items {
        store.set(
            &format!("{prefix}{}", item.key),
            &item.value,
            SetOptions {
                category: Some(item.category),
                source: Some(taskforge_core::types::MemorySource::Auto),
                session_id: session_id.map(String::from),
                ..Default::default()
            },
        )?;
        stored += 1;
    }
    Ok(stored)
}

fn session_id_for(task_id: Uuid) -> String {
    format!("task:{task_id}")
}

fn result_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

fn slugify(text: &str) -> String {
    let mut out = String::new();
    let mut last_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_matches('-').chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rusqlite::Connection;
    use std::sync::atomic::AtomicUsize;
    use taskforge_agent::{ChatRequest, ProviderError};
    use taskforge_core::types::{ChatResponse, NotifyPolicy, TaskKind, TaskStatus, TriggerMode, Usage};
    use taskforge_tokenizer::EstimatorTokenizer;

    struct ScriptedProvider {
        responses: std::sync::Mutex<Vec<Result<ChatResponse, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn ok(contents: &[&str]) -> Self {
            Self {
                responses: std::sync::Mutex::new(
                    contents
                        .iter()
                        .map(|c| {
                            Ok(ChatResponse {
                                content: c.to_string(),
                                tool_calls: None,
                                usage: Usage { input_tokens: 10, output_tokens: 5 },
                                model: "scripted".into(),
                                confidence: None,
                            })
                        })
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(message: &str) -> Self {
            Self { responses: std::sync::Mutex::new(vec![Err(message.to_string())]), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, _req: ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("scripted provider ran out of responses");
            }
            match responses.remove(0) {
                Ok(r) => Ok(r),
                Err(message) => Err(ProviderError::Unavailable(message)),
            }
        }
    }

    fn task_store() -> Arc<TaskStore> {
        Arc::new(TaskStore::new(Connection::open_in_memory().unwrap()).unwrap())
    }

    fn memory_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(Connection::open_in_memory().unwrap(), 3).unwrap())
    }

    fn deps(local: Arc<dyn LlmProvider>) -> RunnerDeps {
        RunnerDeps::minimal(local, Arc::new(EstimatorTokenizer))
    }

    fn base_task(created_by: &str) -> NewTask {
        NewTask {
            name: "check inbox".into(),
            description: None,
            kind: TaskKind::Oneshot,
            prompt: "summarize unread mail".into(),
            workflow: None,
            memory_context: None,
            memory_category: None,
            interval_ms: None,
            cron_expression: None,
            business_hours: None,
            depends_on: None,
            event_source: None,
            event_config: None,
            trigger_mode: TriggerMode::Execute,
            persist_conversation: false,
            max_runs: Some(1),
            notify: NotifyPolicy::Always,
            channel: "cli".into(),
            channel_target: "local".into(),
            created_by: created_by.into(),
        }
    }

    fn orchestration() -> OrchestrationConfig {
        OrchestrationConfig { task_timeout_ms: 5_000, ..Default::default() }
    }

    #[tokio::test]
    async fn successful_execution_updates_task_and_records_run() {
        let store = task_store();
        let task = store.create(base_task("user")).unwrap();

        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::ok(&["all caught up"]));
        let runner = Runner::new(store.clone(), memory_store(), deps(provider), orchestration());

        runner.clone().execute(task.id, None).await.unwrap();

        let updated = store.get(task.id).unwrap().unwrap();
        assert_eq!(updated.run_count, 1);
        assert_eq!(updated.consecutive_failures, 0);
        assert!(updated.last_result_hash.is_some());
        assert_eq!(updated.status, TaskStatus::Done); // max_runs: 1 reached, store forces terminal status

        let runs = store.get_recent_runs(task.id, 5).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, taskforge_core::types::RunStatus::Success);
    }

    #[tokio::test]
    async fn failure_classifies_and_schedules_retry_without_pausing() {
        let store = task_store();
        let mut new = base_task("user");
        new.kind = TaskKind::Scheduled;
        new.interval_ms = Some(3_600_000);
        let task = store.create(new).unwrap();

        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::failing("503 service unavailable"));
        let runner = Runner::new(store.clone(), memory_store(), deps(provider), orchestration());

        runner.clone().execute(task.id, None).await.unwrap();

        let updated = store.get(task.id).unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Active);
        assert_eq!(updated.consecutive_failures, 1);
        assert_eq!(updated.last_error_kind, Some(taskforge_core::types::FailureKind::Transient));
        assert!(updated.next_run_at.is_some());
    }

    #[tokio::test]
    async fn repeated_transient_failures_pause_the_task() {
        let store = task_store();
        let mut new = base_task("user");
        new.kind = TaskKind::Scheduled;
        new.interval_ms = Some(60_000);
        let task = store.create(new).unwrap();

        // Seed four prior consecutive failures, then run a fifth (transient
        // failures pause at consecutive_failures >= 4, see failure::retry_policy).
        store.update(task.id, TaskChanges { consecutive_failures: Some(4), ..Default::default() }, None).unwrap();

        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::failing("ECONNRESET by peer"));
        let runner = Runner::new(store.clone(), memory_store(), deps(provider), orchestration());
        runner.clone().execute(task.id, None).await.unwrap();

        let updated = store.get(task.id).unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Paused);
        assert_eq!(updated.last_error_kind, Some(taskforge_core::types::FailureKind::Transient));
    }

    #[tokio::test]
    async fn scheduled_dependent_is_made_due_after_parent_success() {
        let store = task_store();
        let parent = store.create(base_task("user")).unwrap();

        let mut dep_new = base_task("user");
        dep_new.name = "follow-up".into();
        dep_new.kind = TaskKind::Scheduled;
        dep_new.interval_ms = Some(3_600_000);
        dep_new.depends_on = Some(parent.id);
        let dep = store.create(dep_new).unwrap();
        store.update(dep.id, TaskChanges { next_run_at: Some(None), ..Default::default() }, None).unwrap();

        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::ok(&["done"]));
        let runner = Runner::new(store.clone(), memory_store(), deps(provider), orchestration());
        runner.clone().execute(parent.id, None).await.unwrap();

        let updated_dep = store.get(dep.id).unwrap().unwrap();
        assert!(updated_dep.next_run_at.is_some());
    }

    #[test]
    fn classify_and_policy_are_pure_and_deterministic() {
        assert_eq!(classify_error("429"), taskforge_core::types::FailureKind::RateLimit);
        let p = retry_policy(taskforge_core::types::FailureKind::RateLimit, 0);
        assert!(!p.should_pause);
    }
}
