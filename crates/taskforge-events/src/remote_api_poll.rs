//! Remote-API poller (spec §4.10): dispatches named tool invocations on an
//! interval, fires when the output's hash changes **and** a relevance
//! predicate for the event type passes. Initial poll sets the baseline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use sha2::{Digest, Sha256};
use taskforge_agent::ToolRegistry;
use taskforge_core::types::{EventPayload, ToolCall};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::common::{EventSource, OnTrigger};
use crate::error::Result;

const DEFAULT_INTERVAL_MS: u64 = 60_000;

/// One polled tool invocation, keyed by `(event_type, reference)` for
/// baseline tracking.
#[derive(Clone)]
pub struct ApiPollTarget {
    pub event_type: String,
    pub reference: String,
    pub tool_name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

/// `(event_type, output) -> bool`.
pub type RelevancePredicate = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

pub struct RemoteApiPollSource {
    registry: Arc<ToolRegistry>,
    targets: Vec<ApiPollTarget>,
    interval_ms: u64,
    relevance: RelevancePredicate,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteApiPollSource {
    pub fn new(registry: Arc<ToolRegistry>, targets: Vec<ApiPollTarget>, relevance: RelevancePredicate) -> Self {
        Self { registry, targets, interval_ms: DEFAULT_INTERVAL_MS, relevance, task: Mutex::new(None) }
    }

    pub fn with_interval_ms(mut self, ms: u64) -> Self {
        self.interval_ms = ms;
        self
    }

    fn hash(output: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(output.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl EventSource for RemoteApiPollSource {
    async fn start(&self, on_trigger: OnTrigger) -> Result<()> {
        let registry = self.registry.clone();
        let targets = self.targets.clone();
        let interval_ms = self.interval_ms;
        let relevance = self.relevance.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            let mut baselines: HashMap<(String, String), String> = HashMap::new();

            loop {
                interval.tick().await;
                for target in &targets {
                    let call = ToolCall {
                        id: uuid::Uuid::new_v4().to_string(),
                        name: target.tool_name.clone(),
                        arguments: target.arguments.clone(),
                    };
                    let result = registry.execute(&call).await;
                    if !result.success {
                        continue;
                    }

                    let key = (target.event_type.clone(), target.reference.clone());
                    let fingerprint = RemoteApiPollSource::hash(&result.output);
                    let previous = baselines.insert(key, fingerprint.clone());

                    let changed = match &previous {
                        None => false, // first observation: baseline only
                        Some(prev) => *prev != fingerprint,
                    };
                    if changed && relevance(&target.event_type, &result.output) {
                        on_trigger(EventPayload {
                            source: "remote_api_poll".into(),
                            summary: format!("{} changed", target.event_type),
                            data: json!({"event_type": target.event_type, "reference": target.reference, "output": result.output}),
                        });
                    }
                }
            }
        });

        *self.task.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait as async_trait_attr;
    use taskforge_core::types::ToolResult;

    use super::*;

    struct CountingTool {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait_attr]
    impl taskforge_agent::Tool for CountingTool {
        fn name(&self) -> &str {
            "poll_target"
        }
        fn description(&self) -> &str {
            "returns an incrementing counter"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _input: serde_json::Value) -> ToolResult {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            ToolResult::success(n.to_string())
        }
    }

    #[tokio::test]
    async fn fires_only_when_hash_changes_and_relevant() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(CountingTool { calls: std::sync::atomic::AtomicUsize::new(0) }));
        let registry = Arc::new(registry);

        let targets = vec![ApiPollTarget {
            event_type: "counter".into(),
            reference: "main".into(),
            tool_name: "poll_target".into(),
            arguments: serde_json::Map::new(),
        }];

        let source = RemoteApiPollSource::new(registry, targets, Arc::new(|_, _| true)).with_interval_ms(20);
        let fired = Arc::new(AtomicUsize::new(0));
        let counted = fired.clone();
        source.start(Arc::new(move |_| { counted.fetch_add(1, Ordering::SeqCst); })).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(90)).await;
        source.stop().await.unwrap();

        // First poll sets baseline (counter=0), subsequent polls each change
        // the output so every poll after the first fires.
        assert!(fired.load(Ordering::SeqCst) >= 2);
    }
}
