//! `execute_command` tool — one-shot shell command execution. Safety is
//! enforced by the registry's [`super::SafetyChecker`] hook, not by this
//! tool itself.

use std::time::Duration;

use async_trait::async_trait;
use taskforge_core::types::ToolResult;
use tokio::process::Command;
use tokio::time::timeout;

use super::Tool;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ExecuteCommandTool;

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its stdout and stderr. Default timeout is 30 seconds."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "The shell command to execute via sh -c." }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let Some(command) = input.get("command").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: command");
        };

        let child = Command::new("sh").arg("-c").arg(command).output();
        let output = match timeout(DEFAULT_TIMEOUT, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolResult::error(format!("failed to spawn command: {e}")),
            Err(_) => return ToolResult::error(format!("command timed out after {DEFAULT_TIMEOUT:?}")),
        };

        let mut text = String::new();
        text.push_str(&String::from_utf8_lossy(&output.stdout));
        if !output.stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("[stderr]\n");
            text.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        if !output.status.success() {
            text.push_str(&format!("\n[exit code: {}]", output.status.code().unwrap_or(-1)));
        }
        if text.is_empty() {
            text = "(no output)".to_string();
        }

        if output.status.success() {
            ToolResult::success(text)
        } else {
            ToolResult::error(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_simple_command() {
        let tool = ExecuteCommandTool;
        let result = tool.execute(serde_json::json!({"command": "echo hi"})).await;
        assert!(result.success);
        assert!(result.output.contains("hi"));
    }

    #[tokio::test]
    async fn reports_nonzero_exit() {
        let tool = ExecuteCommandTool;
        let result = tool.execute(serde_json::json!({"command": "exit 3"})).await;
        assert!(!result.success);
        assert!(result.output.contains("exit code: 3"));
    }
}
