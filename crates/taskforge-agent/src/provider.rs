use async_trait::async_trait;
use taskforge_core::types::{ChatResponse, Message, ToolDefinition};

/// Streaming token callback. Providers that don't stream never call it.
pub type OnToken = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub on_token: Option<OnToken>,
}

pub struct ChatRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolDefinition],
    pub options: ChatOptions,
}

/// Uniform LLM interface (spec §4.5). A provider is free to ignore
/// `options.on_token` if it cannot stream.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, req: ChatRequest<'_>) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Distinct context-size overflow signal (spec §4.5/§4.7/§7): the
    /// server reports the window it actually enforced, so the caller can
    /// refit and retry once instead of treating this as a generic failure.
    #[error("context window overflow: server reports window of {actual_window} tokens")]
    ContextSize { actual_window: u32 },

    #[error("operation cancelled")]
    Cancelled,
}
