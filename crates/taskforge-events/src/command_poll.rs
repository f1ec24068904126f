//! Shell-command poller (spec §4.10): runs a command on an interval,
//! compares output to the previous run, fires on change. The initial poll
//! only sets the baseline.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use sha2::{Digest, Sha256};
use taskforge_core::types::EventPayload;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::common::{EventSource, OnTrigger};
use crate::error::Result;

const DEFAULT_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMode {
    Hash,
    Full,
    ExitCode,
}

pub struct CommandPollSource {
    command: String,
    interval_ms: u64,
    diff_mode: DiffMode,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CommandPollSource {
    pub fn new(command: impl Into<String>, diff_mode: DiffMode) -> Self {
        Self { command: command.into(), interval_ms: DEFAULT_INTERVAL_MS, diff_mode, task: Mutex::new(None) }
    }

    pub fn with_interval_ms(mut self, ms: u64) -> Self {
        self.interval_ms = ms;
        self
    }

    async fn run_once(command: &str) -> (String, i32) {
        match Command::new("sh").arg("-c").arg(command).output().await {
            Ok(output) => (String::from_utf8_lossy(&output.stdout).to_string(), output.status.code().unwrap_or(-1)),
            Err(e) => {
                warn!(error = %e, "command poll failed to spawn");
                (String::new(), -1)
            }
        }
    }

    fn fingerprint(mode: DiffMode, stdout: &str, exit_code: i32) -> String {
        match mode {
            DiffMode::Hash => {
                let mut hasher = Sha256::new();
                hasher.update(stdout.as_bytes());
                hex::encode(hasher.finalize())
            }
            DiffMode::Full => stdout.to_string(),
            DiffMode::ExitCode => exit_code.to_string(),
        }
    }
}

#[async_trait]
impl EventSource for CommandPollSource {
    async fn start(&self, on_trigger: OnTrigger) -> Result<()> {
        let command = self.command.clone();
        let interval_ms = self.interval_ms;
        let diff_mode = self.diff_mode;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            let mut baseline: Option<String> = None;
            loop {
                interval.tick().await;
                let (stdout, exit_code) = CommandPollSource::run_once(&command).await;
                let fingerprint = CommandPollSource::fingerprint(diff_mode, &stdout, exit_code);

                match &baseline {
                    None => baseline = Some(fingerprint),
                    Some(prev) if *prev != fingerprint => {
                        baseline = Some(fingerprint);
                        on_trigger(EventPayload {
                            source: "command_poll".into(),
                            summary: format!("output of `{command}` changed"),
                            data: json!({"stdout": stdout, "exit_code": exit_code}),
                        });
                    }
                    Some(_) => {}
                }
            }
        });

        *self.task.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn initial_run_sets_baseline_without_firing() {
        let source = CommandPollSource::new("echo stable", DiffMode::Hash).with_interval_ms(30);
        let fired = Arc::new(AtomicUsize::new(0));
        let counted = fired.clone();
        source.start(Arc::new(move |_| { counted.fetch_add(1, Ordering::SeqCst); })).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        source.stop().await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fires_on_changing_output() {
        let dir = tempfile::tempdir().unwrap();
        let counter_file = dir.path().join("counter");
        std::fs::write(&counter_file, "0").unwrap();
        let command = format!(
            "n=$(cat {0}); n=$((n+1)); echo $n > {0}; echo $n",
            counter_file.display()
        );
        let source = CommandPollSource::new(command, DiffMode::Full).with_interval_ms(20);
        let fired = Arc::new(AtomicUsize::new(0));
        let counted = fired.clone();
        source.start(Arc::new(move |_| { counted.fetch_add(1, Ordering::SeqCst); })).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        source.stop().await.unwrap();
        assert!(fired.load(Ordering::SeqCst) >= 2);
    }
}
