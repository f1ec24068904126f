//! Provider failover (spec §4.5): try slots in priority order, skip
//! remaining retries on a provider when it reports [`ProviderError::RateLimited`],
//! and fall through to the next slot once a provider's retries are exhausted.

use async_trait::async_trait;
use taskforge_core::types::ChatResponse;
use tokio::time::{sleep, Duration};
use tracing::warn;

use crate::provider::{ChatRequest, LlmProvider, ProviderError};

pub struct ProviderSlot {
    pub provider: Box<dyn LlmProvider>,
    pub max_retries: u32,
}

/// Routes a single logical `chat` call across an ordered list of providers,
/// itself implementing [`LlmProvider`] so callers don't need to special-case
/// a router vs. a single provider.
pub struct ProviderRouter {
    slots: Vec<ProviderSlot>,
}

impl ProviderRouter {
    pub fn new(slots: Vec<ProviderSlot>) -> Self {
        Self { slots }
    }
}

#[async_trait]
impl LlmProvider for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn chat(&self, req: ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for slot in &self.slots {
            for attempt in 0..=slot.max_retries {
                let attempt_req = ChatRequest {
                    messages: req.messages,
                    tools: req.tools,
                    options: Default::default(),
                };
                match slot.provider.chat(attempt_req).await {
                    Ok(resp) => return Ok(resp),
                    Err(ProviderError::RateLimited { retry_after_ms }) => {
                        warn!(
                            provider = slot.provider.name(),
                            retry_after_ms, "provider rate limited, moving to next slot"
                        );
                        last_err = Some(ProviderError::RateLimited { retry_after_ms });
                        break;
                    }
                    Err(e) => {
                        warn!(
                            provider = slot.provider.name(),
                            attempt, error = %e, "provider attempt failed"
                        );
                        last_err = Some(e);
                        if attempt < slot.max_retries {
                            sleep(Duration::from_millis(200 * (attempt as u64 + 1))).await;
                        }
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ProviderError::Unavailable("no providers configured".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use taskforge_core::types::{ChatResponse, Usage};

    struct FlakyProvider {
        name: &'static str,
        calls: Arc<AtomicU32>,
        fail_times: u32,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn chat(&self, _req: ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                return Err(ProviderError::Unavailable("down".into()));
            }
            Ok(ChatResponse {
                content: self.name.to_string(),
                tool_calls: None,
                usage: Usage::default(),
                model: self.name.to_string(),
                confidence: None,
            })
        }
    }

    #[tokio::test]
    async fn router_falls_back_to_second_provider() {
        let first_calls = Arc::new(AtomicU32::new(0));
        let second_calls = Arc::new(AtomicU32::new(0));

        let router = ProviderRouter::new(vec![
            ProviderSlot {
                provider: Box::new(FlakyProvider { name: "first", calls: first_calls.clone(), fail_times: 99 }),
                max_retries: 1,
            },
            ProviderSlot {
                provider: Box::new(FlakyProvider { name: "second", calls: second_calls.clone(), fail_times: 0 }),
                max_retries: 1,
            },
        ]);

        let messages = Vec::new();
        let tools = Vec::new();
        let req = ChatRequest { messages: &messages, tools: &tools, options: Default::default() };
        let resp = router.chat(req).await.unwrap();
        assert_eq!(resp.model, "second");
        assert_eq!(first_calls.load(Ordering::SeqCst), 2); // one attempt + one retry
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn router_errors_when_all_fail() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = ProviderRouter::new(vec![ProviderSlot {
            provider: Box::new(FlakyProvider { name: "only", calls: calls.clone(), fail_times: 99 }),
            max_retries: 0,
        }]);

        let messages = Vec::new();
        let tools = Vec::new();
        let req = ChatRequest { messages: &messages, tools: &tools, options: Default::default() };
        let result = router.chat(req).await;
        assert!(result.is_err());
    }
}
