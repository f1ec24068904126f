pub mod local;
pub mod loop_;
pub mod provider;
pub mod remote;
pub mod router;
pub mod routing;
pub mod tools;

pub use local::LocalProvider;
pub use loop_::{run, AgentEvents, AgentRunResult, RunOptions};
pub use provider::{ChatOptions, ChatRequest, LlmProvider, OnToken, ProviderError};
pub use remote::RemoteProvider;
pub use router::{ProviderRouter, ProviderSlot};
pub use routing::{route, should_retry_with_remote, RouteDecision, Target};
pub use tools::{FuzzyResolver, LevenshteinFuzzyResolver, Tool, ToolRegistry};
