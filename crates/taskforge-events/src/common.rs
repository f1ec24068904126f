//! Common event-source interface (spec §4.10): `start(on_trigger)` registers
//! a callback, `stop()` releases resources. The callback receives an
//! `EventPayload` and is fire-and-forget — it must not block the source.

use std::sync::Arc;

use async_trait::async_trait;
use taskforge_core::types::EventPayload;

use crate::error::Result;

pub type OnTrigger = Arc<dyn Fn(EventPayload) + Send + Sync>;

#[async_trait]
pub trait EventSource: Send + Sync {
    async fn start(&self, on_trigger: OnTrigger) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// Translates a glob pattern (`*`, `**`) into an anchored regex. `**`
/// matches across path separators, a lone `*` does not.
pub fn glob_to_regex(pattern: &str) -> Result<regex::Regex> {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push('.'),
            c if "\\.+()|[]{}^$".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    regex::Regex::new(&out).map_err(|e| crate::error::EventError::InvalidGlob(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_star_crosses_separators() {
        let re = glob_to_regex("**/target/**").unwrap();
        assert!(re.is_match("a/b/target/debug/foo"));
    }

    #[test]
    fn single_star_stays_within_segment() {
        let re = glob_to_regex("*.rs").unwrap();
        assert!(re.is_match("main.rs"));
        assert!(!re.is_match("src/main.rs"));
    }
}
