//! Failure classification and retry policy (spec §7/§4.11). Both are pure
//! functions over the rendered error string and the failure count, testable
//! without a runtime — the same "decision function with no side effects"
//! shape `taskforge_agent::routing::route` uses for local/remote selection.

use taskforge_core::types::{FailureKind, RetryPolicy};

/// Classify an error's rendered message into one of spec §7's kinds via
/// string pattern matches, in priority order (most specific first).
pub fn classify_error(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("rate_limit") || lower.contains("429") || lower.contains("too many requests") {
        FailureKind::RateLimit
    } else if lower.contains("context") && (lower.contains("overflow") || lower.contains("too long") || lower.contains("exceeds")) {
        FailureKind::ContextOverflow
    } else if lower.contains("unauthorized")
        || lower.contains("forbidden")
        || lower.contains("invalid api key")
        || lower.contains("401")
        || lower.contains("403")
    {
        FailureKind::Auth
    } else if lower.contains("timeout") || lower.contains("timed out") || lower.contains("deadline exceeded") {
        FailureKind::Timeout
    } else if lower.contains("connection reset")
        || lower.contains("econnreset")
        || lower.contains("econnrefused")
        || lower.contains("broken pipe")
        || lower.contains("network")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
    {
        FailureKind::Transient
    } else {
        FailureKind::Unknown
    }
}

/// Compute the retry/pause decision for `kind` given the number of
/// consecutive failures already recorded (before this one).
pub fn retry_policy(kind: FailureKind, consecutive_failures: u32) -> RetryPolicy {
    const MINUTE: u64 = 60_000;
    match kind {
        FailureKind::RateLimit => {
            let exp = consecutive_failures.min(3);
            let backoff = (5 * MINUTE) * 5u64.pow(exp);
            RetryPolicy { backoff_ms: backoff.min(60 * MINUTE), should_pause: false }
        }
        FailureKind::Transient => {
            let should_pause = consecutive_failures >= 4;
            let backoff = (30_000u64) * 2u64.pow(consecutive_failures.min(10));
            RetryPolicy { backoff_ms: backoff.min(15 * MINUTE), should_pause }
        }
        FailureKind::Timeout => RetryPolicy { backoff_ms: MINUTE, should_pause: consecutive_failures >= 1 },
        FailureKind::Auth | FailureKind::ContextOverflow => RetryPolicy { backoff_ms: 0, should_pause: true },
        FailureKind::Unknown => {
            let should_pause = consecutive_failures >= 2;
            let backoff = MINUTE * 2u64.pow(consecutive_failures.min(10));
            RetryPolicy { backoff_ms: backoff.min(60 * MINUTE), should_pause }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_patterns() {
        assert_eq!(classify_error("429 Too Many Requests"), FailureKind::RateLimit);
        assert_eq!(classify_error("request context overflow: too long"), FailureKind::ContextOverflow);
        assert_eq!(classify_error("401 Unauthorized: invalid API key"), FailureKind::Auth);
        assert_eq!(classify_error("operation timed out after 30s"), FailureKind::Timeout);
        assert_eq!(classify_error("ECONNRESET by peer"), FailureKind::Transient);
        assert_eq!(classify_error("something weird happened"), FailureKind::Unknown);
    }

    #[test]
    fn rate_limit_always_retries_with_growing_backoff() {
        let p0 = retry_policy(FailureKind::RateLimit, 0);
        let p1 = retry_policy(FailureKind::RateLimit, 1);
        let p5 = retry_policy(FailureKind::RateLimit, 5);
        assert!(!p0.should_pause && !p1.should_pause && !p5.should_pause);
        assert!(p1.backoff_ms > p0.backoff_ms);
        assert_eq!(p5.backoff_ms, 60 * 60_000); // capped at 60 min, exp clamps at 3
    }

    #[test]
    fn transient_pauses_on_fifth_failure() {
        assert!(!retry_policy(FailureKind::Transient, 3).should_pause);
        assert!(retry_policy(FailureKind::Transient, 4).should_pause);
    }

    #[test]
    fn timeout_retries_once_then_pauses() {
        assert!(!retry_policy(FailureKind::Timeout, 0).should_pause);
        assert!(retry_policy(FailureKind::Timeout, 1).should_pause);
    }

    #[test]
    fn auth_and_context_overflow_pause_immediately() {
        assert!(retry_policy(FailureKind::Auth, 0).should_pause);
        assert!(retry_policy(FailureKind::ContextOverflow, 0).should_pause);
    }

    #[test]
    fn unknown_pauses_on_third_failure() {
        assert!(!retry_policy(FailureKind::Unknown, 1).should_pause);
        assert!(retry_policy(FailureKind::Unknown, 2).should_pause);
    }

    #[test]
    fn backoff_is_monotonically_non_decreasing_until_cap() {
        for kind in [FailureKind::RateLimit, FailureKind::Transient, FailureKind::Unknown] {
            let mut prev = 0;
            for n in 0..8 {
                let p = retry_policy(kind, n);
                assert!(p.backoff_ms >= prev, "backoff decreased for {kind:?} at n={n}");
                prev = p.backoff_ms;
            }
        }
    }
}
