//! Bounded agent turn loop (spec §4.7), grounded on the request-building and
//! fire-and-forget event-emission shape of `AgentRuntime::chat_with_context`.

use taskforge_context::{fit, FitConfig};
use taskforge_core::config::RoutingConfig;
use taskforge_core::types::{AgentContext, Message, ToolCall, Usage};
use taskforge_tokenizer::Tokenizer;
use tracing::{info, warn};

use crate::provider::{ChatOptions, ChatRequest, LlmProvider, ProviderError};
use crate::routing::{route, should_retry_with_remote, Target};
use crate::tools::ToolRegistry;

const DEFAULT_MAX_TURNS: usize = 10;

/// Observability hooks. All methods fire-and-forget and must never block or
/// change control flow — their absence (the `None` sink) is a no-op.
pub trait AgentEvents: Send + Sync {
    fn on_thinking(&self, _text: &str) {}
    fn on_tool_call_start(&self, _name: &str, _call_id: &str) {}
    fn on_tool_call_complete(&self, _name: &str, _call_id: &str, _success: bool) {}
    fn on_token(&self, _text: &str) {}
}

pub struct RunOptions<'a> {
    pub max_turns: usize,
    pub events: Option<&'a dyn AgentEvents>,
}

impl Default for RunOptions<'_> {
    fn default() -> Self {
        Self { max_turns: DEFAULT_MAX_TURNS, events: None }
    }
}

#[derive(Debug, Clone)]
pub struct AgentRunResult {
    pub content: String,
    pub target: Target,
    pub provider: String,
    pub usage: Usage,
    pub escalated: bool,
    pub turns: usize,
}

/// Run one full user turn against `ctx`, mutating `ctx.messages` in place so
/// the session can be resumed on the next call.
pub async fn run(
    ctx: &mut AgentContext,
    user_message: &str,
    local: &dyn LlmProvider,
    remote: Option<&dyn LlmProvider>,
    tools: &ToolRegistry,
    tokenizer: &dyn Tokenizer,
    routing_config: &RoutingConfig,
    fit_config: &FitConfig,
    options: RunOptions<'_>,
) -> Result<AgentRunResult, ProviderError> {
    ctx.messages.push(Message::user(user_message));

    let mut target = route(&ctx.messages, routing_config).target;
    if target == Target::Remote && remote.is_none() {
        warn!("routing picked remote but no remote provider is configured, falling back to local");
        target = Target::Local;
    }

    let mut usage = Usage::default();
    let mut escalated = false;
    let mut last_content = String::new();
    let mut last_provider_name = local.name().to_string();
    let tool_defs = tools.list_definitions();

    for turn in 0..options.max_turns {
        let provider: &dyn LlmProvider = match target {
            Target::Local => local,
            Target::Remote => remote.unwrap_or(local),
        };
        last_provider_name = provider.name().to_string();

        let fitted = fit(&ctx.system_prompt, &ctx.messages, &tool_defs, fit_config, tokenizer);

        let response = match provider
            .chat(ChatRequest { messages: &fitted, tools: &tool_defs, options: ChatOptions::default() })
            .await
        {
            Ok(r) => r,
            Err(ProviderError::ContextSize { actual_window }) => {
                warn!(actual_window, "provider reported context overflow, refitting and retrying once");
                let mut refit_config = *fit_config;
                refit_config.context_length = actual_window;
                let refitted = fit(&ctx.system_prompt, &ctx.messages, &tool_defs, &refit_config, tokenizer);
                provider
                    .chat(ChatRequest { messages: &refitted, tools: &tool_defs, options: ChatOptions::default() })
                    .await?
            }
            Err(e) => return Err(e),
        };

        usage.accumulate(response.usage);
        last_content = response.content.clone();
        if let Some(events) = options.events {
            events.on_thinking(&response.content);
        }

        if target == Target::Local
            && remote.is_some()
            && should_retry_with_remote(&response, routing_config.confidence_threshold)
        {
            info!(turn, "escalating to remote provider on low confidence");
            target = Target::Remote;
            escalated = true;
            continue;
        }

        let tool_calls: Vec<ToolCall> = response.tool_calls.clone().unwrap_or_default();
        if tool_calls.is_empty() {
            ctx.messages.push(Message::assistant(response.content, None));
            return Ok(AgentRunResult {
                content: last_content,
                target,
                provider: last_provider_name,
                usage,
                escalated,
                turns: turn + 1,
            });
        }

        if let Some(events) = options.events {
            for call in &tool_calls {
                events.on_tool_call_start(&call.name, &call.id);
            }
        }

        ctx.messages.push(Message::assistant(response.content, Some(tool_calls.clone())));
        let results = tools.execute_all(&tool_calls).await;

        let mut escalate_from_tool = false;
        for call in &tool_calls {
            let Some(result) = results.get(&call.id) else {
                continue;
            };
            if let Some(events) = options.events {
                events.on_tool_call_complete(&call.name, &call.id, result.success);
            }
            ctx.messages.push(Message::tool_result(call.id.clone(), result.output.clone()));
            if target == Target::Local && result.suggest_escalation.unwrap_or(false) {
                escalate_from_tool = true;
            }
        }

        if escalate_from_tool && remote.is_some() {
            target = Target::Remote;
            escalated = true;
        }
    }

    warn!(max_turns = options.max_turns, "agent loop exhausted max_turns without a final response");
    Ok(AgentRunResult {
        content: last_content,
        target,
        provider: last_provider_name,
        usage,
        escalated,
        turns: options.max_turns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use taskforge_core::types::ChatResponse;
    use taskforge_tokenizer::EstimatorTokenizer;

    struct ScriptedProvider {
        name: &'static str,
        responses: std::sync::Mutex<Vec<ChatResponse>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn chat(&self, _req: ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("scripted provider ran out of responses");
            }
            Ok(responses.remove(0))
        }
    }

    fn response(content: &str, confidence: Option<f32>) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            tool_calls: None,
            usage: Usage { input_tokens: 10, output_tokens: 5 },
            model: "scripted".to_string(),
            confidence,
        }
    }

    fn ctx() -> AgentContext {
        AgentContext {
            session_id: "s1".into(),
            workspace_dir: std::path::PathBuf::from("/tmp"),
            system_prompt: "you are a test agent".into(),
            messages: Vec::new(),
        }
    }

    #[tokio::test]
    async fn s3_escalation_chain_switches_to_remote_on_low_confidence() {
        let local = ScriptedProvider {
            name: "local",
            responses: std::sync::Mutex::new(vec![response("uncertain", Some(0.1))]),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let remote = ScriptedProvider {
            name: "remote",
            responses: std::sync::Mutex::new(vec![response("final answer", None)]),
            calls: Arc::new(AtomicUsize::new(0)),
        };

        let mut context = ctx();
        let tools = ToolRegistry::new();
        let tokenizer = EstimatorTokenizer;
        let routing_config = RoutingConfig {
            default_target: "local".into(),
            always_local_keywords: vec![],
            always_remote_keywords: vec![],
            confidence_threshold: 0.55,
        };
        let fit_config = FitConfig::default();

        let result = run(
            &mut context,
            "hello",
            &local,
            Some(&remote),
            &tools,
            &tokenizer,
            &routing_config,
            &fit_config,
            RunOptions::default(),
        )
        .await
        .unwrap();

        assert!(result.escalated);
        assert_eq!(result.turns, 2);
        assert_eq!(result.target, Target::Remote);
        assert_eq!(result.content, "final answer");
    }

    #[tokio::test]
    async fn returns_immediately_with_no_tool_calls_and_no_escalation() {
        let local = ScriptedProvider {
            name: "local",
            responses: std::sync::Mutex::new(vec![response("done", None)]),
            calls: Arc::new(AtomicUsize::new(0)),
        };

        let mut context = ctx();
        let tools = ToolRegistry::new();
        let tokenizer = EstimatorTokenizer;
        let routing_config = RoutingConfig::default();
        let fit_config = FitConfig::default();

        let result = run(
            &mut context,
            "hi",
            &local,
            None,
            &tools,
            &tokenizer,
            &routing_config,
            &fit_config,
            RunOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.turns, 1);
        assert!(!result.escalated);
        assert_eq!(result.content, "done");
    }
}
