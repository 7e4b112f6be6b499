use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Entries held in the working window unless configured otherwise.
pub const DEFAULT_MEMORY_CAP: usize = 20;

pub const SOURCE_EVENT: &str = "event";
pub const SOURCE_SYSTEM: &str = "system";
pub const SOURCE_INVENTORY: &str = "inventory";
pub const SOURCE_LLM_REASON: &str = "llm_reason";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    SOURCE_EVENT.to_string()
}

impl MemoryEntry {
    pub fn now(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            text: text.into(),
            source: source.into(),
        }
    }
}

/// Append-only durable log behind the working window.
pub trait MemoryStore {
    fn load(&self) -> io::Result<Vec<MemoryEntry>>;
    fn append(&mut self, entry: &MemoryEntry) -> io::Result<()>;
}

/// One JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonlMemoryStore {
    path: PathBuf,
}

impl JsonlMemoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MemoryStore for JsonlMemoryStore {
    fn load(&self) -> io::Result<Vec<MemoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for (idx, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MemoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(
                    path = %self.path.display(),
                    line = idx + 1,
                    error = %err,
                    "skipping undecodable memory line"
                ),
            }
        }
        Ok(entries)
    }

    fn append(&mut self, entry: &MemoryEntry) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

/// Store that keeps nothing. Useful for dry runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMemoryStore;

impl MemoryStore for NullMemoryStore {
    fn load(&self) -> io::Result<Vec<MemoryEntry>> {
        Ok(Vec::new())
    }

    fn append(&mut self, _entry: &MemoryEntry) -> io::Result<()> {
        Ok(())
    }
}

/// Bounded working window over the durable memory log.
pub struct AgentMemory {
    entries: VecDeque<MemoryEntry>,
    cap: usize,
    store: Box<dyn MemoryStore>,
}

impl AgentMemory {
    /// Loads the durable log once and keeps the newest `cap` entries.
    pub fn open(store: Box<dyn MemoryStore>, cap: usize) -> Self {
        let cap = cap.max(1);
        let mut entries: VecDeque<MemoryEntry> = match store.load() {
            Ok(loaded) => loaded.into(),
            Err(err) => {
                warn!(error = %err, "failed to load memory; starting empty");
                VecDeque::new()
            }
        };
        while entries.len() > cap {
            entries.pop_front();
        }
        if !entries.is_empty() {
            info!(entries = entries.len(), "loaded agent memory");
        }
        Self {
            entries,
            cap,
            store,
        }
    }

    pub fn in_memory(cap: usize) -> Self {
        Self::open(Box::new(NullMemoryStore), cap)
    }

    pub fn add(&mut self, text: impl Into<String>, source: &str) {
        let entry = MemoryEntry::now(text, source);
        if let Err(err) = self.store.append(&entry) {
            warn!(error = %err, "failed to persist memory entry");
        }
        self.entries.push_back(entry);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// Up to `n` newest entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<MemoryEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(start).cloned().collect()
    }

    /// Empties the working window. The durable log is left untouched.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn entries(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }
}
