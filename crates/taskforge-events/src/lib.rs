//! Event sources (spec §4.10): filesystem watches, shell-command polling,
//! remote-API polling, and webhook ingestion, behind one [`EventSource`]
//! interface a task's `event_config` selects at runtime.

pub mod command_poll;
pub mod common;
pub mod error;
pub mod file_watch;
pub mod remote_api_poll;
pub mod webhook;

pub use command_poll::{CommandPollSource, DiffMode};
pub use common::{glob_to_regex, EventSource, OnTrigger};
pub use error::{EventError, Result};
pub use file_watch::FileWatchSource;
pub use remote_api_poll::{ApiPollTarget, RelevancePredicate, RemoteApiPollSource};
pub use webhook::{WebhookAuthError, WebhookAuthMode};
