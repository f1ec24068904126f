//! Tool system: the trait every tool implements, a registry that resolves
//! calls by name, and optional safety-check / confirmation / audit / fuzzy-
//! resolution hooks around execution.

pub mod execute_command;
pub mod fs;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use taskforge_core::types::{ToolCall, ToolDefinition, ToolResult};
use tracing::{debug, warn};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    async fn execute(&self, input: serde_json::Value) -> ToolResult;
}

/// Outcome of a pre-execution safety check (spec §4.9). `Block` refuses the
/// call outright; `Confirm` defers to a [`ConfirmationSink`] and fails open
/// (allows the call, with a warning) if none is registered.
pub enum SafetyDecision {
    Allow,
    Block(String),
    Confirm(String),
}

#[async_trait]
pub trait SafetyChecker: Send + Sync {
    async fn check(&self, tool_name: &str, input: &serde_json::Value) -> SafetyDecision;
}

#[async_trait]
pub trait ConfirmationSink: Send + Sync {
    async fn confirm(&self, tool_name: &str, reason: &str) -> bool;
}

#[derive(Debug, Clone)]
pub enum AuditOutcome {
    Success,
    Blocked(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub tool: String,
    pub args: serde_json::Value,
    pub outcome: AuditOutcome,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Optional, pluggable remapping of a misspelled tool name and a reshaping
/// of its arguments against the resolved tool's schema (spec §4.4). With no
/// resolver registered the registry only ever matches exact names.
pub trait FuzzyResolver: Send + Sync {
    /// Best-guess remap of `name` against the registry's known tool names,
    /// or `None` if nothing is close enough to call a match.
    fn resolve_name(&self, name: &str, candidates: &[&str]) -> Option<String>;

    /// Reshape `arguments` against `schema` before the call is dispatched.
    /// The default is the identity reshape — a resolver only needs to
    /// override this if it also coerces field names/types.
    fn reshape_arguments(&self, _schema: &serde_json::Value, arguments: serde_json::Value) -> serde_json::Value {
        arguments
    }
}

/// The edit-distance-2 resolver used before fuzzy resolution became
/// opt-in. Registered explicitly via [`ToolRegistry::with_fuzzy_resolver`]
/// to keep the old typo-tolerant behavior.
pub struct LevenshteinFuzzyResolver;

impl FuzzyResolver for LevenshteinFuzzyResolver {
    fn resolve_name(&self, name: &str, candidates: &[&str]) -> Option<String> {
        let mut best: Option<(&str, usize)> = None;
        for candidate in candidates {
            let dist = levenshtein(name, candidate);
            if dist <= 2 && best.as_ref().map(|(_, d)| dist < *d).unwrap_or(true) {
                best = Some((candidate, dist));
            }
        }
        best.map(|(name, _)| name.to_string())
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    safety: Option<Arc<dyn SafetyChecker>>,
    confirmation: Option<Arc<dyn ConfirmationSink>>,
    audit: Option<Arc<dyn AuditSink>>,
    fuzzy: Option<Arc<dyn FuzzyResolver>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with_safety_checker(mut self, checker: Arc<dyn SafetyChecker>) -> Self {
        self.safety = Some(checker);
        self
    }

    pub fn with_confirmation_sink(mut self, sink: Arc<dyn ConfirmationSink>) -> Self {
        self.confirmation = Some(sink);
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn with_fuzzy_resolver(mut self, resolver: Arc<dyn FuzzyResolver>) -> Self {
        self.fuzzy = Some(resolver);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Build a sub-registry containing only the named tools, sharing the
    /// same safety/confirmation/audit/fuzzy hooks. Used by the runner to
    /// hand discovery invocations a proposal-only view of the registry.
    pub fn scoped(&self, names: &[&str]) -> ToolRegistry {
        let mut scoped = ToolRegistry {
            tools: HashMap::new(),
            safety: self.safety.clone(),
            confirmation: self.confirmation.clone(),
            audit: self.audit.clone(),
            fuzzy: self.fuzzy.clone(),
        };
        for name in names {
            if let Some(tool) = self.tools.get(*name) {
                scoped.tools.insert((*name).to_string(), tool.clone());
            }
        }
        scoped
    }

    pub fn list_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.input_schema(),
            })
            .collect()
    }

    /// Resolve a tool name to a registered tool. Exact match first; if that
    /// misses and a [`FuzzyResolver`] is configured, ask it for a remap.
    /// Without one, a miss is final — no typo tolerance.
    fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        if let Some(t) = self.tools.get(name) {
            return Some(t.clone());
        }
        let resolver = self.fuzzy.as_ref()?;
        let candidates: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        let remapped = resolver.resolve_name(name, &candidates)?;
        self.tools.get(&remapped).cloned()
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let mut args = serde_json::Value::Object(call.arguments.clone());

        let Some(tool) = self.resolve(&call.name) else {
            return ToolResult::error(format!("Unknown tool: {}", call.name));
        };

        if tool.name() != call.name {
            if let Some(resolver) = &self.fuzzy {
                args = resolver.reshape_arguments(&tool.input_schema(), args);
            }
        }

        if let Some(checker) = &self.safety {
            match checker.check(tool.name(), &args).await {
                SafetyDecision::Block(reason) => {
                    self.audit(tool.name(), &args, AuditOutcome::Blocked(reason.clone()));
                    return ToolResult::error(format!("blocked: {reason}"));
                }
                SafetyDecision::Confirm(reason) => {
                    let confirmed = match &self.confirmation {
                        Some(sink) => sink.confirm(tool.name(), &reason).await,
                        None => {
                            warn!(tool = tool.name(), "no confirmation sink registered, failing open");
                            true
                        }
                    };
                    if !confirmed {
                        self.audit(tool.name(), &args, AuditOutcome::Blocked("confirmation declined".into()));
                        return ToolResult::error("confirmation declined");
                    }
                }
                SafetyDecision::Allow => {}
            }
        }

        debug!(tool = tool.name(), "executing tool");
        let result = tool.execute(args.clone()).await;
        self.audit(
            tool.name(),
            &args,
            if result.success {
                AuditOutcome::Success
            } else {
                AuditOutcome::Failed(result.output.clone())
            },
        );
        result
    }

    /// Execute every call concurrently, keyed by tool-call id.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> HashMap<String, ToolResult> {
        let results = join_all(calls.iter().map(|c| async move { (c.id.clone(), self.execute(c).await) })).await;
        results.into_iter().collect()
    }

    fn audit(&self, tool: &str, args: &serde_json::Value, outcome: AuditOutcome) {
        if let Some(sink) = &self.audit {
            sink.record(AuditEntry {
                tool: tool.to_string(),
                args: args.clone(),
                outcome,
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for i in 1..=a.len() {
        let mut prev = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let cur = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev
            } else {
                1 + prev.min(row[j]).min(row[j - 1])
            };
            prev = cur;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_core::types::ToolResult as CoreToolResult;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, input: serde_json::Value) -> CoreToolResult {
            CoreToolResult::success(input.to_string())
        }
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall { id: id.to_string(), name: name.to_string(), arguments: serde_json::Map::new() }
    }

    #[tokio::test]
    async fn resolves_typo_within_edit_distance_two_when_fuzzy_resolver_configured() {
        let mut reg = ToolRegistry::new().with_fuzzy_resolver(Arc::new(LevenshteinFuzzyResolver));
        reg.register(Arc::new(EchoTool));
        let result = reg.execute(&call("1", "ecco")).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn typo_is_unresolved_without_a_fuzzy_resolver() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let result = reg.execute(&call("1", "ecco")).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let reg = ToolRegistry::new();
        let result = reg.execute(&call("1", "totally_unrelated_name")).await;
        assert!(!result.success);
        assert_eq!(result.output, "Unknown tool: totally_unrelated_name");
    }

    #[tokio::test]
    async fn execute_all_runs_concurrently_and_keys_by_id() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let calls = vec![call("a", "echo"), call("b", "echo")];
        let results = reg.execute_all(&calls).await;
        assert_eq!(results.len(), 2);
        assert!(results["a"].success);
        assert!(results["b"].success);
    }

    #[tokio::test]
    async fn scoped_registry_only_exposes_named_tools() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let scoped = reg.scoped(&["nonexistent"]);
        assert!(scoped.list_definitions().is_empty());
    }
}
