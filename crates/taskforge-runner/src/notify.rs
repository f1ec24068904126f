//! Outbound notification (spec §4.11 step 6, §7 "user-visible failure
//! behavior"). No concrete channel adapter lives in this crate — the
//! collaborator injects one, the same trait-injection shape
//! `taskforge_memory::extraction::FactExtractor` uses for LLM calls.

use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel: &str, target: &str, message: &str);
}

/// A `Notifier` that drops every message. Useful for tests and for runtimes
/// that have no configured outbound channel.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _channel: &str, _target: &str, _message: &str) {}
}
