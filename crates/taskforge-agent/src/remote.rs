//! Remote provider adapter: an OpenAI-compatible `/v1/chat/completions`
//! endpoint, with auth-header and rate-limit handling mirroring a typical
//! hosted chat-completions client.

use async_trait::async_trait;
use serde::Deserialize;
use taskforge_core::types::{ChatResponse, ToolCall, Usage};
use tracing::{debug, warn};

use crate::provider::{ChatRequest, LlmProvider, ProviderError};

pub struct RemoteProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl RemoteProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for RemoteProvider {
    fn name(&self) -> &str {
        "remote"
    }

    async fn chat(&self, req: ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(&self.model, &req);
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(model = %self.model, "sending request to remote provider");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited { retry_after_ms });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            if let Some(window) = context_overflow_window(&text) {
                return Err(ProviderError::ContextSize { actual_window: window });
            }
            warn!(status, body = %text, "remote provider API error");
            return Err(ProviderError::Api { status, message: text });
        }

        let api_resp: ApiResponse = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(parse_response(api_resp, self.model.clone()))
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
        "temperature": req.options.temperature,
        "max_tokens": req.options.max_tokens,
    })
}

fn parse_response(resp: ApiResponse, model: String) -> ChatResponse {
    let choice = resp.choices.into_iter().next();
    let (content, tool_calls) = match choice {
        Some(c) => {
            let tool_calls = if c.message.tool_calls.is_empty() {
                None
            } else {
                Some(
                    c.message
                        .tool_calls
                        .into_iter()
                        .map(|tc| {
                            let arguments: serde_json::Value =
                                serde_json::from_str(&tc.function.arguments).unwrap_or(serde_json::json!({}));
                            ToolCall {
                                id: tc.id,
                                name: tc.function.name,
                                arguments: arguments.as_object().cloned().unwrap_or_default(),
                            }
                        })
                        .collect(),
                )
            };
            (c.message.content.unwrap_or_default(), tool_calls)
        }
        None => (String::new(), None),
    };

    ChatResponse {
        content,
        tool_calls,
        usage: Usage {
            input_tokens: resp.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
            output_tokens: resp.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
        },
        model,
        confidence: None,
    }
}

fn context_overflow_window(body: &str) -> Option<u32> {
    let lower = body.to_lowercase();
    if !(lower.contains("context_length_exceeded") || lower.contains("maximum context length")) {
        return None;
    }
    let re = regex::Regex::new(r"(\d{3,7})").ok()?;
    re.find(body).and_then(|m| m.as_str().parse::<u32>().ok())
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunctionCall,
}

#[derive(Deserialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_context_length_exceeded_error() {
        let body = r#"{"error": {"message": "This model's maximum context length is 8192 tokens", "code": "context_length_exceeded"}}"#;
        assert_eq!(context_overflow_window(body), Some(8192));
    }

    #[test]
    fn ignores_unrelated_error() {
        let body = r#"{"error": {"message": "invalid api key"}}"#;
        assert_eq!(context_overflow_window(body), None);
    }
}
