//! Workflow execution (spec §4.11 step 3). The sequential step evaluator
//! itself is out of scope here — this crate only needs the `{success,
//! workflow, output}` contract so it can decide whether to fall through to
//! prompt execution. The collaborator injects the real evaluator, following
//! the same trait-injection shape as `taskforge_memory::FactExtractor`.

use async_trait::async_trait;

pub struct WorkflowOutcome {
    pub success: bool,
    pub output: String,
}

#[async_trait]
pub trait WorkflowExecutor: Send + Sync {
    async fn execute(&self, workflow: &serde_json::Value, prompt: &str) -> WorkflowOutcome;
}

/// A `WorkflowExecutor` that always reports failure with empty output,
/// causing every task with a `workflow` set to fall through to prompt
/// execution. Used when no evaluator is wired in.
pub struct NoopWorkflowExecutor;

#[async_trait]
impl WorkflowExecutor for NoopWorkflowExecutor {
    async fn execute(&self, _workflow: &serde_json::Value, _prompt: &str) -> WorkflowOutcome {
        WorkflowOutcome { success: false, output: String::new() }
    }
}
