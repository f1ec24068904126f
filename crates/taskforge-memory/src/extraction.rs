//! LLM-driven extraction & summarization (spec §4.3). The store never calls
//! an LLM itself; callers (the runner/agent crate) inject one through
//! [`FactExtractor`], the same injected-provider shape used elsewhere so
//! summarization stays decoupled from whatever owns model access.

use async_trait::async_trait;
use taskforge_core::types::{MemoryCategory, MemorySource};
use tracing::warn;

use crate::error::Result;
use crate::store::MemoryStore;
use crate::types::SetOptions;

const SUMMARY_INPUT_CHAR_CAP: usize = 50_000;
const SUMMARY_OUTPUT_TOKEN_CAP: u32 = 500;

#[async_trait]
pub trait FactExtractor: Send + Sync {
    /// Send `system` + `user` to a provider and return its raw text
    /// response. Errors are treated as extraction/summarization failure.
    async fn complete(&self, system: &str, user: &str, max_output_tokens: u32) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct ExtractedItem {
    pub key: String,
    pub value: String,
    pub category: MemoryCategory,
}

const EXTRACTION_SYSTEM_PROMPT: &str = "Extract durable facts, preferences, decisions, project \
details, named entities, and lessons from the conversation below. Respond with a JSON array of \
objects shaped like {\"key\": string, \"value\": string, \"category\": one of fact|preference|\
decision|project|entity|lesson}. Respond with nothing else.";

/// Run extraction against `transcript`, sanitize and cap the results, and
/// write each item to `store` under `source`. Returns the number of items
/// stored. Any LLM or parse failure logs a warning and returns `Ok(0)`
/// rather than propagating — extraction is best-effort per spec §7.
pub async fn extract_and_store(
    extractor: &dyn FactExtractor,
    store: &MemoryStore,
    transcript: &str,
    session_id: Option<&str>,
    source: MemorySource,
    max_extractions: usize,
) -> Result<usize> {
    let raw = match extractor.complete(EXTRACTION_SYSTEM_PROMPT, transcript, 1024).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "fact extraction LLM call failed");
            return Ok(0);
        }
    };

    let items = parse_extractions(&raw, max_extractions);
    let mut stored = 0;
    for item in items {
        store.set(
            &item.key,
            &item.value,
            SetOptions {
                category: Some(item.category),
                source: Some(source),
                session_id: session_id.map(String::from),
                ..Default::default()
            },
        )?;
        stored += 1;
    }
    Ok(stored)
}

/// Parse a JSON array of extraction items, tolerating a fenced code block
/// (```json ... ```` or plain ```` ... ````) wrapping the array.
pub fn parse_extractions(raw: &str, max_extractions: usize) -> Vec<ExtractedItem> {
    let json_text = strip_fence(raw);
    let Ok(value) = serde_json::from_str::<serde_json::Value>(json_text.trim()) else {
        warn!("extraction output was not valid JSON");
        return Vec::new();
    };
    let Some(array) = value.as_array() else {
        return Vec::new();
    };

    let mut items = Vec::new();
    for entry in array {
        let (Some(key), Some(val)) = (
            entry.get("key").and_then(|v| v.as_str()),
            entry.get("value").and_then(|v| v.as_str()),
        ) else {
            continue;
        };
        let category = entry
            .get("category")
            .and_then(|v| v.as_str())
            .map(parse_category)
            .unwrap_or(MemoryCategory::Fact);
        let key = sanitize_key(key);
        if key.is_empty() {
            continue;
        }
        items.push(ExtractedItem { key, value: val.to_string(), category });
        if items.len() >= max_extractions {
            break;
        }
    }
    items
}

fn parse_category(s: &str) -> MemoryCategory {
    match s {
        "preference" => MemoryCategory::Preference,
        "decision" => MemoryCategory::Decision,
        "project" => MemoryCategory::Project,
        "entity" => MemoryCategory::Entity,
        "lesson" => MemoryCategory::Lesson,
        _ => MemoryCategory::Fact,
    }
}

/// `^[a-z0-9_]+$` with runs of invalid characters collapsed to a single
/// underscore, truncated to 100 chars.
fn sanitize_key(key: &str) -> String {
    let mut out = String::new();
    let mut last_was_underscore = false;
    for c in key.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            out.push('_');
            last_was_underscore = true;
        }
    }
    let trimmed = out.trim_matches('_');
    trimmed.chars().take(100).collect()
}

fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        return rest.trim_end_matches("```").trim();
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        return rest.trim_end_matches("```").trim();
    }
    trimmed
}

/// Produce a compact summary of dropped messages, capped at
/// [`SUMMARY_OUTPUT_TOKEN_CAP`] output tokens with a truncated-input
/// fallback. On LLM failure, falls back to a deterministic bullet list of
/// user messages plus the unique tool names invoked.
pub async fn summarize_dropped(
    extractor: &dyn FactExtractor,
    transcript: &str,
    user_messages: &[String],
    tool_names: &[String],
) -> String {
    let truncated_input: String = transcript.chars().take(SUMMARY_INPUT_CHAR_CAP).collect();
    let system = "Summarize the conversation excerpt below in a few sentences, preserving any \
        decisions, facts, and open threads. Respond with plain text only.";

    match extractor.complete(system, &truncated_input, SUMMARY_OUTPUT_TOKEN_CAP).await {
        Ok(summary) if !summary.trim().is_empty() => summary,
        _ => deterministic_fallback(user_messages, tool_names),
    }
}

fn deterministic_fallback(user_messages: &[String], tool_names: &[String]) -> String {
    let mut out = String::from("[summary unavailable] Earlier messages from the user:\n");
    for m in user_messages {
        out.push_str("- ");
        out.push_str(m);
        out.push('\n');
    }
    let mut unique_tools: Vec<&String> = Vec::new();
    for t in tool_names {
        if !unique_tools.contains(&t) {
            unique_tools.push(t);
        }
    }
    if !unique_tools.is_empty() {
        out.push_str("Tools used: ");
        out.push_str(
            &unique_tools
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_key_collapses_invalid_chars() {
        assert_eq!(sanitize_key("Hello World!!"), "hello_world");
        assert_eq!(sanitize_key("  leading"), "leading");
    }

    #[test]
    fn parse_extractions_tolerates_fenced_json() {
        let raw = "```json\n[{\"key\":\"favorite color\",\"value\":\"blue\",\"category\":\"preference\"}]\n```";
        let items = parse_extractions(raw, 10);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key, "favorite_color");
        assert_eq!(items[0].category, MemoryCategory::Preference);
    }

    #[test]
    fn parse_extractions_caps_at_max() {
        let raw = serde_json::to_string(&(0..10).map(|i| serde_json::json!({"key": format!("k{i}"), "value": "v"})).collect::<Vec<_>>()).unwrap();
        let items = parse_extractions(&raw, 3);
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn parse_extractions_on_garbage_returns_empty() {
        assert!(parse_extractions("not json at all", 10).is_empty());
    }
}
