//! Filesystem watcher (spec §4.10): watches a list of paths, debounces
//! bursts of change events into one payload. Grounded on `notify`'s
//! channel-based watcher API, bridged into async via a forwarding task and a
//! `tokio::time::sleep`-reset debounce loop (the same "collapse many events
//! into one fire" shape `SchedulerEngine` uses for single-ticker jobs).

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use async_trait::async_trait;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use serde_json::json;
use taskforge_core::types::EventPayload;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::common::{glob_to_regex, EventSource, OnTrigger};
use crate::error::Result;

const DEFAULT_DEBOUNCE_MS: u64 = 1000;

pub struct FileWatchSource {
    paths: Vec<PathBuf>,
    recursive: bool,
    debounce_ms: u64,
    ignore: Vec<Regex>,
    running: Mutex<Option<Running>>,
}

struct Running {
    watcher: RecommendedWatcher,
    forward_task: JoinHandle<()>,
    debounce_task: JoinHandle<()>,
}

impl FileWatchSource {
    pub fn new(paths: Vec<PathBuf>, recursive: bool, ignore_globs: &[&str]) -> Result<Self> {
        let ignore = ignore_globs.iter().map(|g| glob_to_regex(g)).collect::<Result<Vec<_>>>()?;
        Ok(Self { paths, recursive, debounce_ms: DEFAULT_DEBOUNCE_MS, ignore, running: Mutex::new(None) })
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }
}

#[async_trait]
impl EventSource for FileWatchSource {
    async fn start(&self, on_trigger: OnTrigger) -> Result<()> {
        let (std_tx, std_rx) = std_mpsc::channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = std_tx.send(res);
            },
            notify::Config::default(),
        )?;

        let mode = if self.recursive { RecursiveMode::Recursive } else { RecursiveMode::NonRecursive };
        for path in &self.paths {
            watcher.watch(path, mode)?;
        }

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<String>();
        let forward_task = tokio::task::spawn_blocking(move || {
            while let Ok(Ok(event)) = std_rx.recv() {
                for path in event.paths {
                    if raw_tx.send(path.to_string_lossy().to_string()).is_err() {
                        return;
                    }
                }
            }
        });

        let ignore = self.ignore.clone();
        let debounce_ms = self.debounce_ms;
        let debounce_task = tokio::spawn(async move {
            let mut pending: HashSet<String> = HashSet::new();
            loop {
                let deadline = tokio::time::sleep(Duration::from_millis(debounce_ms));
                tokio::pin!(deadline);
                tokio::select! {
                    maybe_path = raw_rx.recv() => {
                        match maybe_path {
                            Some(path) => {
                                if !ignore.iter().any(|re| re.is_match(&path)) {
                                    pending.insert(path);
                                }
                            }
                            None => break,
                        }
                    }
                    _ = &mut deadline, if !pending.is_empty() => {
                        let files: Vec<String> = pending.drain().collect();
                        on_trigger(EventPayload {
                            source: "file_watch".into(),
                            summary: format!("{} file(s) changed", files.len()),
                            data: json!({"files": files}),
                        });
                    }
                }
            }
        });

        *self.running.lock().await = Some(Running { watcher, forward_task, debounce_task });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(running) = self.running.lock().await.take() {
            running.forward_task.abort();
            running.debounce_task.abort();
            drop(running.watcher);
        }
        Ok(())
    }
}

impl Drop for FileWatchSource {
    fn drop(&mut self) {
        if self.running.try_lock().map(|g| g.is_some()).unwrap_or(false) {
            warn!("FileWatchSource dropped without calling stop()");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn debounces_bursts_into_one_payload() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileWatchSource::new(vec![dir.path().to_path_buf()], false, &[]).unwrap().with_debounce_ms(100);

        let fire_count = Arc::new(AtomicUsize::new(0));
        let counted = fire_count.clone();
        source.start(Arc::new(move |_payload| { counted.fetch_add(1, Ordering::SeqCst); })).await.unwrap();

        for i in 0..3 {
            std::fs::write(dir.path().join(format!("f{i}.txt")), b"x").unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        source.stop().await.unwrap();

        assert_eq!(fire_count.load(Ordering::SeqCst), 1);
    }
}
