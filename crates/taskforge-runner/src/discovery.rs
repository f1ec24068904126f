//! Discovery (spec §4.12): a periodic, idle-gated agent-loop invocation that
//! proposes at most three new tasks via a scoped, proposal-only tool
//! registry. Never mutates the task store directly — any store write happens
//! as a side effect of the `task_propose` tool the collaborator wires into
//! the scoped registry.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use taskforge_agent::{AgentRunResult, LlmProvider, RunOptions, ToolRegistry};
use taskforge_context::FitConfig;
use taskforge_core::config::RoutingConfig;
use taskforge_core::types::AgentContext;
use taskforge_tokenizer::Tokenizer;

use crate::error::Result;

const DISCOVERY_PROMPT: &str = "Review recent activity, memory, and task history. If there are at \
most three clearly valuable recurring or follow-up tasks worth proposing, call task_propose for \
each. Otherwise propose nothing.";

const ACTIVITY_WINDOW_MS: i64 = 2 * 60 * 60 * 1000;
const PROPOSAL_TOOL: &str = "task_propose";

pub struct Discovery {
    interval_ms: u64,
    idle_threshold_ms: u64,
    last_fired_at: Mutex<Option<DateTime<Utc>>>,
}

impl Discovery {
    pub fn new(interval_ms: u64, idle_threshold_ms: u64) -> Self {
        Self { interval_ms, idle_threshold_ms, last_fired_at: Mutex::new(None) }
    }

    /// Whether discovery should run right now, given the last time the user
    /// interacted with the system. Pure decision logic, independent of the
    /// agent-loop invocation below.
    fn should_fire(&self, now: DateTime<Utc>, last_interaction_at: DateTime<Utc>) -> bool {
        let since_interaction = (now - last_interaction_at).num_milliseconds();
        if since_interaction < 0 {
            return false;
        }
        let recently_active = since_interaction <= ACTIVITY_WINDOW_MS;
        let currently_idle = since_interaction as u64 >= self.idle_threshold_ms;
        if !recently_active || !currently_idle {
            return false;
        }
        let last_fired = self.last_fired_at.lock().unwrap();
        match *last_fired {
            None => true,
            Some(t) => (now - t).num_milliseconds() >= self.interval_ms as i64,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn maybe_fire(
        &self,
        now: DateTime<Utc>,
        last_interaction_at: DateTime<Utc>,
        local: &dyn LlmProvider,
        tools: &ToolRegistry,
        tokenizer: &dyn Tokenizer,
        routing_config: &RoutingConfig,
        fit_config: &FitConfig,
    ) -> Result<Option<AgentRunResult>> {
        if !self.should_fire(now, last_interaction_at) {
            return Ok(None);
        }
        *self.last_fired_at.lock().unwrap() = Some(now);

        let scoped = tools.scoped(&[PROPOSAL_TOOL]);
        let mut ctx = AgentContext {
            session_id: "discovery".into(),
            workspace_dir: std::path::PathBuf::from("."),
            system_prompt: "You are the background discovery pass of a task orchestrator.".into(),
            messages: Vec::new(),
        };

        // Forced local-only: `remote` is `None` regardless of what the
        // caller's routing config would otherwise pick.
        let result = taskforge_agent::run(
            &mut ctx,
            DISCOVERY_PROMPT,
            local,
            None,
            &scoped,
            tokenizer,
            routing_config,
            fit_config,
            RunOptions::default(),
        )
        .await;

        match result {
            Ok(r) => Ok(Some(r)),
            Err(e) => {
                tracing::warn!(error = %e, "discovery agent-loop invocation failed");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_only_when_recently_active_and_currently_idle() {
        let d = Discovery::new(1_800_000, 600_000);
        let now = Utc::now();

        // Active 5 minutes ago: recently active, but not idle long enough yet.
        assert!(!d.should_fire(now, now - chrono::Duration::minutes(5)));

        // Active 20 minutes ago: recently active and past the idle threshold.
        assert!(d.should_fire(now, now - chrono::Duration::minutes(20)));

        // Active 3 hours ago: outside the recent-activity window.
        assert!(!d.should_fire(now, now - chrono::Duration::hours(3)));
    }

    #[test]
    fn does_not_refire_within_interval() {
        let d = Discovery::new(1_800_000, 0);
        let now = Utc::now();
        let active_at = now - chrono::Duration::minutes(10);
        assert!(d.should_fire(now, active_at));
        *d.last_fired_at.lock().unwrap() = Some(now);
        assert!(!d.should_fire(now + chrono::Duration::minutes(5), active_at));
        assert!(d.should_fire(now + chrono::Duration::minutes(31), active_at));
    }
}
