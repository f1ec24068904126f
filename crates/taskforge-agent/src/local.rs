//! Local provider adapter: an Ollama-style `/api/chat` endpoint, following
//! its request-building and connect-error mapping conventions.

use async_trait::async_trait;
use serde::Deserialize;
use taskforge_core::types::{ChatResponse, ToolCall, Usage};
use tracing::{debug, warn};

use crate::provider::{ChatRequest, LlmProvider, ProviderError};

pub struct LocalProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl LocalProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), model: model.into() }
    }
}

#[async_trait]
impl LlmProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn chat(&self, req: ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(&self.model, &req);
        let url = format!("{}/api/chat", self.base_url);

        debug!(model = %self.model, "sending request to local provider");

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::Unavailable(e.to_string())
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            if let Some(window) = context_overflow_window(&text) {
                return Err(ProviderError::ContextSize { actual_window: window });
            }
            warn!(status, body = %text, "local provider API error");
            return Err(ProviderError::Api { status, message: text });
        }

        let api_resp: ApiResponse = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(parse_response(api_resp))
    }
}

fn build_request_body(model: &str, req: &ChatRequest<'_>) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = req
        .messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": m.role,
                "content": m.content.as_text(),
                "tool_call_id": m.tool_call_id,
            })
        })
        .collect();

    let tools: Vec<serde_json::Value> = req
        .tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "type": "function",
                "function": { "name": t.name, "description": t.description, "parameters": t.parameters },
            })
        })
        .collect();

    serde_json::json!({
        "model": model,
        "messages": messages,
        "tools": tools,
        "stream": false,
        "options": {
            "num_predict": req.options.max_tokens,
            "temperature": req.options.temperature,
        },
    })
}

/// No known confidence signal from this endpoint shape — escalation here
/// relies entirely on tool-reported `suggest_escalation` (spec §4.7 step e).
fn parse_response(resp: ApiResponse) -> ChatResponse {
    let tool_calls = if resp.message.tool_calls.is_empty() {
        None
    } else {
        Some(
            resp.message
                .tool_calls
                .into_iter()
                .map(|c| ToolCall {
                    id: uuid::Uuid::new_v4().to_string(),
                    name: c.function.name,
                    arguments: c.function.arguments.as_object().cloned().unwrap_or_default(),
                })
                .collect(),
        )
    };

    ChatResponse {
        content: resp.message.content,
        tool_calls,
        usage: Usage {
            input_tokens: resp.prompt_eval_count.unwrap_or(0),
            output_tokens: resp.eval_count.unwrap_or(0),
        },
        model: resp.model,
        confidence: None,
    }
}

fn context_overflow_window(body: &str) -> Option<u32> {
    let lower = body.to_lowercase();
    if !(lower.contains("context length") || lower.contains("context window") || lower.contains("exceeds")) {
        return None;
    }
    let re = regex::Regex::new(r"(\d{3,7})").ok()?;
    re.find(body).and_then(|m| m.as_str().parse::<u32>().ok())
}

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    message: ApiMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Deserialize)]
struct ApiToolCall {
    function: ApiFunctionCall,
}

#[derive(Deserialize)]
struct ApiFunctionCall {
    name: String,
    arguments: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_context_overflow_from_error_body() {
        let body = "error: this model's context length is 4096 tokens, please reduce input";
        assert_eq!(context_overflow_window(body), Some(4096));
    }

    #[test]
    fn ignores_unrelated_error_body() {
        let body = "error: invalid api key";
        assert_eq!(context_overflow_window(body), None);
    }
}
