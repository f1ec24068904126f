use taskforge_core::types::{MemoryCategory, MemorySource};

use crate::error::Result;
use crate::store::MemoryStore;
use crate::types::SetOptions;

const CHUNK_MAX_CHARS: usize = 1500;

/// External collaborator that owns `workspace/logs/YYYY-MM-DD.md` (spec §6).
pub trait DailyLogSource {
    fn list_daily_logs(&self) -> Vec<String>;
    fn read_daily_log(&self, date: &str) -> Option<String>;
}

/// A line is an entry boundary when it starts with `[<ISO8601>]`.
fn is_entry_start(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('[') else { return false };
    match rest.find(']') {
        Some(idx) => chrono::DateTime::parse_from_rfc3339(&rest[..idx]).is_ok(),
        None => false,
    }
}

fn chunk_log(content: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in content.lines() {
        let addition_len = line.len() + 1;
        if is_entry_start(line) && !current.is_empty() && current.len() + addition_len > CHUNK_MAX_CHARS {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
        if current.len() > CHUNK_MAX_CHARS {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

impl MemoryStore {
    /// Ingest every daily log the collaborator exposes. Idempotent: a date
    /// whose chunk 0 already exists is skipped entirely.
    pub fn ingest_daily_logs(&self, source: &dyn DailyLogSource) -> Result<usize> {
        let mut ingested = 0;
        for date in source.list_daily_logs() {
            let chunk0_key = format!("log:{date}:0");
            if self.get(&chunk0_key)?.is_some() {
                continue;
            }
            let Some(content) = source.read_daily_log(&date) else { continue };
            for (idx, chunk) in chunk_log(&content).into_iter().enumerate() {
                let key = format!("log:{date}:{idx}");
                self.set(
                    &key,
                    &chunk,
                    SetOptions {
                        category: Some(MemoryCategory::Conversation),
                        source: Some(MemorySource::Auto),
                        ..Default::default()
                    },
                )?;
                ingested += 1;
            }
        }
        Ok(ingested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_respect_entry_boundaries() {
        let content = format!(
            "[2026-07-26T09:00:00Z] {}\n[2026-07-26T09:05:00Z] short\n",
            "x".repeat(1490)
        );
        let chunks = chunk_log(&content);
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.len() <= CHUNK_MAX_CHARS + 32);
        }
    }
}
