//! Filesystem tools: read, write, and list files under the workspace directory.

use async_trait::async_trait;
use taskforge_core::types::ToolResult;

use super::Tool;

const MAX_OUTPUT_CHARS: usize = 30_000;
const MAX_ENTRIES: usize = 1_000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Optionally limit to a line range with \
         `offset` (1-based first line) and `limit` (number of lines to return)."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Absolute or relative path to the file." },
                "offset": { "type": "integer", "description": "1-based line number to start reading from (optional)." },
                "limit": { "type": "integer", "description": "Maximum number of lines to return (optional)." }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let Some(path) = input.get("path").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: path");
        };

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("failed to read '{path}': {e}")),
        };

        let offset = input.get("offset").and_then(|v| v.as_u64()).map(|v| v.saturating_sub(1) as usize);
        let limit = input.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);

        let result = if offset.is_some() || limit.is_some() {
            let start = offset.unwrap_or(0);
            let lines: Vec<&str> = content.lines().skip(start).collect();
            let lines = if let Some(n) = limit { &lines[..n.min(lines.len())] } else { &lines[..] };
            lines.join("\n")
        } else {
            content
        };

        let result = if result.len() > MAX_OUTPUT_CHARS {
            format!("{}\n\n[output truncated at {MAX_OUTPUT_CHARS} characters]", &result[..MAX_OUTPUT_CHARS])
        } else {
            result
        };

        ToolResult::success(result)
    }
}

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates parent directories if they do not exist. \
         Overwrites the file if it already exists."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Absolute or relative path to write to." },
                "content": { "type": "string", "description": "Text content to write into the file." }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let Some(path) = input.get("path").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: path");
        };
        let Some(content) = input.get("content").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: content");
        };

        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return ToolResult::error(format!("failed to create directories for '{path}': {e}"));
                }
            }
        }

        let byte_len = content.len();
        if let Err(e) = std::fs::write(path, content) {
            return ToolResult::error(format!("failed to write '{path}': {e}"));
        }

        ToolResult::success(format!("File written: {byte_len} bytes to '{path}'"))
    }
}

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the contents of a directory. Each entry shows its type (file/dir) \
         and size in bytes. Returns at most 1000 entries."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Absolute or relative path to the directory." }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let Some(path) = input.get("path").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required parameter: path");
        };

        let read_dir = match std::fs::read_dir(path) {
            Ok(rd) => rd,
            Err(e) => return ToolResult::error(format!("failed to list '{path}': {e}")),
        };

        let mut entries: Vec<String> = Vec::new();
        let mut truncated = false;

        for entry in read_dir {
            if entries.len() >= MAX_ENTRIES {
                truncated = true;
                break;
            }
            let Ok(entry) = entry else { continue };
            let Ok(metadata) = entry.metadata() else { continue };

            let name = entry.file_name().to_string_lossy().to_string();
            let kind = if metadata.is_dir() { "dir" } else { "file" };
            entries.push(format!("[{kind}] {name} ({} bytes)", metadata.len()));
        }

        entries.sort();
        let mut output = entries.join("\n");
        if truncated {
            output.push_str(&format!("\n\n[truncated at {MAX_ENTRIES} entries]"));
        }
        if output.is_empty() {
            output = "(empty directory)".to_string();
        }

        ToolResult::success(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        let write = WriteFileTool;
        let result = write.execute(serde_json::json!({"path": path.to_str(), "content": "hello"})).await;
        assert!(result.success);

        let read = ReadFileTool;
        let result = read.execute(serde_json::json!({"path": path.to_str()})).await;
        assert!(result.success);
        assert_eq!(result.output, "hello");
    }

    #[tokio::test]
    async fn read_missing_file_errors() {
        let read = ReadFileTool;
        let result = read.execute(serde_json::json!({"path": "/nonexistent/path/xyz"})).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn list_files_reports_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let list = ListFilesTool;
        let result = list.execute(serde_json::json!({"path": dir.path().to_str()})).await;
        assert!(result.success);
        assert!(result.output.contains("a.txt"));
    }
}
