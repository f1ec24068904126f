//! Task runner (spec §4.11, §4.12): the polling loop that executes due and
//! event-triggered tasks, classifies failures into retry/pause decisions,
//! cascades to dependents, and periodically runs discovery.

pub mod discovery;
pub mod error;
pub mod executor;
pub mod failure;
pub mod notify;
pub mod queue;
pub mod runner;

pub use discovery::Discovery;
pub use error::{Result, RunnerError};
pub use executor::{NoopWorkflowExecutor, WorkflowExecutor, WorkflowOutcome};
pub use failure::{classify_error, retry_policy};
pub use notify::{NullNotifier, Notifier};
pub use queue::{DedupeTracker, EventQueue, QueuedEvent};
pub use runner::{Runner, RunnerDeps};
