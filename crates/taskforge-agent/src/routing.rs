//! Local/remote routing (spec §4.6). Pure decision functions, distinct from
//! [`crate::router::ProviderRouter`]'s failover concern: `route` decides
//! which provider slot the agent loop should prefer before it ever calls
//! out, `should_retry_with_remote` decides whether to escalate mid-turn.

use taskforge_core::config::RoutingConfig;
use taskforge_core::types::{ChatResponse, Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub target: Target,
    pub rationale: String,
}

/// Inspect the last user message against the configured keyword lists.
/// Always-remote keywords win over always-local if both somehow match,
/// since escalating to a stronger model is the safer default.
pub fn route(messages: &[Message], config: &RoutingConfig) -> RouteDecision {
    let last_user = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_text().to_lowercase());

    let Some(text) = last_user else {
        return RouteDecision {
            target: default_target(config),
            rationale: "no user message yet, using default target".into(),
        };
    };

    for kw in &config.always_remote_keywords {
        if text.contains(&kw.to_lowercase()) {
            return RouteDecision {
                target: Target::Remote,
                rationale: format!("matched always-remote keyword '{kw}'"),
            };
        }
    }

    for kw in &config.always_local_keywords {
        if text.contains(&kw.to_lowercase()) {
            return RouteDecision {
                target: Target::Local,
                rationale: format!("matched always-local keyword '{kw}'"),
            };
        }
    }

    RouteDecision {
        target: default_target(config),
        rationale: "no keyword match, using default target".into(),
    }
}

fn default_target(config: &RoutingConfig) -> Target {
    if config.default_target.eq_ignore_ascii_case("remote") {
        Target::Remote
    } else {
        Target::Local
    }
}

/// True when `response.confidence` is present and below `threshold` — the
/// opaque escalation signal from spec §4.6. A response with no confidence
/// metadata never triggers escalation.
pub fn should_retry_with_remote(response: &ChatResponse, threshold: f32) -> bool {
    response.confidence.map(|c| c < threshold).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_core::types::Usage;

    fn config() -> RoutingConfig {
        RoutingConfig {
            default_target: "local".into(),
            always_local_keywords: vec!["secret".into()],
            always_remote_keywords: vec!["research".into()],
            confidence_threshold: 0.55,
        }
    }

    #[test]
    fn routes_to_remote_on_keyword() {
        let messages = vec![Message::user("please do deep research on this")];
        let decision = route(&messages, &config());
        assert_eq!(decision.target, Target::Remote);
    }

    #[test]
    fn routes_to_local_on_keyword() {
        let messages = vec![Message::user("this is secret, keep it local")];
        let decision = route(&messages, &config());
        assert_eq!(decision.target, Target::Local);
    }

    #[test]
    fn falls_back_to_default_with_no_keyword_match() {
        let messages = vec![Message::user("what's the weather")];
        let decision = route(&messages, &config());
        assert_eq!(decision.target, Target::Local);
    }

    #[test]
    fn remote_keyword_wins_when_both_match() {
        let messages = vec![Message::user("secret research project")];
        let decision = route(&messages, &config());
        assert_eq!(decision.target, Target::Remote);
    }

    fn response_with_confidence(c: Option<f32>) -> ChatResponse {
        ChatResponse { content: String::new(), tool_calls: None, usage: Usage::default(), model: "m".into(), confidence: c }
    }

    #[test]
    fn escalates_below_threshold() {
        assert!(should_retry_with_remote(&response_with_confidence(Some(0.2)), 0.55));
    }

    #[test]
    fn does_not_escalate_above_threshold() {
        assert!(!should_retry_with_remote(&response_with_confidence(Some(0.9)), 0.55));
    }

    #[test]
    fn does_not_escalate_without_confidence_metadata() {
        assert!(!should_retry_with_remote(&response_with_confidence(None), 0.55));
    }
}
