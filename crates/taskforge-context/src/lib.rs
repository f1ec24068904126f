//! Context-window fitter (spec §4.2): trims a message history to a hard
//! token budget, keeping tool-call/tool-result groups atomic and dropping
//! from the oldest end.

use taskforge_core::types::{Content, Message, Role, ToolDefinition};
use taskforge_tokenizer::Tokenizer;

const MESSAGE_OVERHEAD_TOKENS: usize = 7;
const TOOL_CALL_TOKENS: usize = 15;
const TOOL_CALL_ID_TOKENS: usize = 5;
const IMAGE_TOKENS: usize = 1000;
const TOOL_DEF_WRAPPER_TOKENS: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct FitConfig {
    pub context_length: u32,
    pub reserve_for_output: u32,
    pub max_tool_result_tokens: u32,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            context_length: 32_768,
            reserve_for_output: 2_048,
            max_tool_result_tokens: 8_000,
        }
    }
}

fn message_tokens(msg: &Message, tokenizer: &dyn Tokenizer) -> usize {
    let mut n = MESSAGE_OVERHEAD_TOKENS + tokenizer.count_tokens(&msg.content.as_text());
    n += msg.content.image_count() * IMAGE_TOKENS;
    if let Some(calls) = &msg.tool_calls {
        n += calls.len() * TOOL_CALL_TOKENS;
    }
    if msg.tool_call_id.is_some() {
        n += TOOL_CALL_ID_TOKENS;
    }
    n
}

pub fn tool_definitions_tokens(tools: &[ToolDefinition], tokenizer: &dyn Tokenizer) -> usize {
    tools
        .iter()
        .map(|t| {
            let block = serde_json::json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            });
            tokenizer.count_tokens(&block.to_string()) + TOOL_DEF_WRAPPER_TOKENS
        })
        .sum()
}

/// A contiguous run of messages that must be included or excluded together:
/// an assistant message with tool_calls plus its immediately-following
/// tool-role messages, or a lone message.
struct Group {
    indices: Vec<usize>,
    tokens: usize,
}

fn build_groups(messages: &[Message], tokenizer: &dyn Tokenizer) -> Vec<Group> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i < messages.len() {
        let mut indices = vec![i];
        let has_tool_calls = messages[i].role == Role::Assistant
            && messages[i]
                .tool_calls
                .as_ref()
                .map(|c| !c.is_empty())
                .unwrap_or(false);
        let mut j = i + 1;
        if has_tool_calls {
            while j < messages.len() && messages[j].role == Role::Tool {
                indices.push(j);
                j += 1;
            }
        }
        let tokens = indices.iter().map(|&k| message_tokens(&messages[k], tokenizer)).sum();
        groups.push(Group { indices, tokens });
        i = j;
    }
    groups
}

/// Truncate a tool-result message's content to `max_tokens`, appending a
/// human-readable suffix. One refinement pass if the first trim overshoots.
fn truncate_tool_result(content: &str, max_tokens: u32, tokenizer: &dyn Tokenizer) -> String {
    let total = tokenizer.count_tokens(content);
    if total <= max_tokens as usize || content.is_empty() {
        return content.to_string();
    }
    let suffix = "\n\n[truncated: tool result exceeded token budget]";
    let ratio = content.len() as f64 / total as f64;
    let mut target_chars = ((max_tokens as f64) * ratio).floor().max(0.0) as usize;
    target_chars = target_chars.min(content.len());

    let mut candidate = truncate_at_char_boundary(content, target_chars);
    let mut combined = format!("{candidate}{suffix}");

    // Refinement pass: if we still overshoot, trim further once.
    if tokenizer.count_tokens(&combined) > max_tokens as usize && target_chars > 0 {
        let over_ratio = (tokenizer.count_tokens(&combined) as f64) / (max_tokens as f64);
        let refined_chars = ((target_chars as f64) / over_ratio).floor().max(0.0) as usize;
        candidate = truncate_at_char_boundary(content, refined_chars);
        combined = format!("{candidate}{suffix}");
    }
    combined
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if max_bytes >= s.len() {
        return s;
    }
    let mut idx = max_bytes;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    &s[..idx]
}

/// Fit `messages` against `config`'s budget. Returns the fitted sequence
/// WITHOUT the system prompt — the caller re-prepends it.
pub fn fit(
    system_prompt: &str,
    messages: &[Message],
    tools: &[ToolDefinition],
    config: &FitConfig,
    tokenizer: &dyn Tokenizer,
) -> Vec<Message> {
    let fixed_cost = tokenizer.count_tokens(system_prompt)
        + tool_definitions_tokens(tools, tokenizer)
        + config.reserve_for_output as usize;

    let budget = (config.context_length as isize) - (fixed_cost as isize);
    if budget <= 0 {
        tracing::warn!(fixed_cost, context_length = config.context_length, "fitter budget non-positive after fixed costs");
        return last_resort(messages);
    }
    let budget = budget as usize;

    // Pre-truncate oversized tool results before grouping/costing.
    let mut working: Vec<Message> = messages.to_vec();
    for m in working.iter_mut() {
        if m.role == Role::Tool {
            let text = m.content.as_text();
            let truncated = truncate_tool_result(&text, config.max_tool_result_tokens, tokenizer);
            if truncated != text {
                m.content = Content::Text(truncated);
            }
        }
    }

    let groups = build_groups(&working, tokenizer);

    // Reserve worst-case notice tokens (scales only with digit count of N,
    // so reserving against the total message count is always sufficient
    // and never meaningfully wastes budget).
    let notice_reserve = tokenizer.count_tokens(&truncation_notice(working.len()));
    let effective_budget = budget.saturating_sub(notice_reserve);

    let mut included: Vec<usize> = Vec::new(); // group indices, newest-first
    let mut used = 0usize;
    for (gi, group) in groups.iter().enumerate().rev() {
        if used + group.tokens > effective_budget {
            break;
        }
        used += group.tokens;
        included.push(gi);
    }

    if included.is_empty() {
        return last_resort(&working);
    }

    included.reverse(); // back to oldest-first order
    let excluded_messages: usize = groups
        .iter()
        .enumerate()
        .filter(|(gi, _)| !included.contains(gi))
        .map(|(_, g)| g.indices.len())
        .sum();

    let mut out = Vec::new();
    if excluded_messages > 0 {
        out.push(Message::system(truncation_notice(excluded_messages)));
    }
    for gi in included {
        for &idx in &groups[gi].indices {
            out.push(working[idx].clone());
        }
    }
    out
}

fn truncation_notice(n: usize) -> String {
    format!("[Earlier conversation ({n} messages) was trimmed to fit context window.]")
}

fn last_resort(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .cloned()
        .or_else(|| messages.last().cloned())
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_core::types::ToolCall;
    use taskforge_tokenizer::Tokenizer;

    /// A tokenizer that returns a fixed count per message, set up keyed by
    /// content text, for deterministic scenario tests (spec §8 S2).
    struct FixedTokenizer(std::collections::HashMap<String, usize>);
    impl Tokenizer for FixedTokenizer {
        fn count_tokens(&self, text: &str) -> usize {
            self.0.get(text).copied().unwrap_or(0)
        }
    }

    #[test]
    fn s2_fitter_grouping_scenario() {
        // u1(10), a1+calls(10), tool1(10), a2(200), u3(10); budget 40 after overhead.
        let mut counts = std::collections::HashMap::new();
        counts.insert("u1".to_string(), 10usize.saturating_sub(MESSAGE_OVERHEAD_TOKENS));
        counts.insert("a1".to_string(), (10usize.saturating_sub(MESSAGE_OVERHEAD_TOKENS + TOOL_CALL_TOKENS)).max(0));
        counts.insert("tool1".to_string(), 10usize.saturating_sub(MESSAGE_OVERHEAD_TOKENS + TOOL_CALL_ID_TOKENS));
        counts.insert("a2".to_string(), 200usize.saturating_sub(MESSAGE_OVERHEAD_TOKENS));
        counts.insert("u3".to_string(), 10usize.saturating_sub(MESSAGE_OVERHEAD_TOKENS));
        counts.insert("".to_string(), 0);
        let tokenizer = FixedTokenizer(counts);

        let messages = vec![
            Message::user("u1"),
            Message::assistant(
                "a1",
                Some(vec![ToolCall {
                    id: "c1".into(),
                    name: "t".into(),
                    arguments: Default::default(),
                }]),
            ),
            Message::tool_result("c1", "tool1"),
            Message::assistant("a2", None),
            Message::user("u3"),
        ];

        let config = FitConfig {
            context_length: 40,
            reserve_for_output: 0,
            max_tool_result_tokens: 100_000,
        };

        let fitted = fit("", &messages, &[], &config, &tokenizer);
        // u3 fits (10 tokens), a2 (200) does not -> stop. Only u3 remains,
        // plus a truncation notice for the 4 excluded messages.
        assert!(fitted.iter().any(|m| m.content.as_text() == "u3"));
        assert!(!fitted.iter().any(|m| m.content.as_text() == "a2"));
        assert_eq!(fitted[0].role, Role::System);
        assert!(fitted[0].content.as_text().contains('4'));
    }

    #[test]
    fn groups_tool_calls_atomically() {
        let tokenizer = EstimatorStub;
        let messages = vec![
            Message::assistant(
                "calling",
                Some(vec![ToolCall {
                    id: "c1".into(),
                    name: "t".into(),
                    arguments: Default::default(),
                }]),
            ),
            Message::tool_result("c1", "result"),
        ];
        let groups = build_groups(&messages, &tokenizer);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].indices, vec![0, 1]);
    }

    struct EstimatorStub;
    impl Tokenizer for EstimatorStub {
        fn count_tokens(&self, text: &str) -> usize {
            text.len()
        }
    }

    #[test]
    fn forces_last_user_message_when_nothing_fits() {
        let tokenizer = EstimatorStub;
        let messages = vec![Message::user(&"x".repeat(1000))];
        let config = FitConfig {
            context_length: 1,
            reserve_for_output: 0,
            max_tool_result_tokens: 100,
        };
        let fitted = fit("", &messages, &[], &config, &tokenizer);
        assert_eq!(fitted.len(), 1);
        assert_eq!(fitted[0].role, Role::User);
    }

    #[test]
    fn truncates_oversized_tool_result() {
        let tokenizer = EstimatorStub;
        let long = "y".repeat(500);
        let truncated = truncate_tool_result(&long, 100, &tokenizer);
        assert!(tokenizer.count_tokens(&truncated) <= 100 + "...[truncated: tool result exceeded token budget]".len());
        assert!(truncated.contains("truncated"));
    }
}
