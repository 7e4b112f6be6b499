use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::modules::action::Action;

/// Full prompt/response pairs for debugging model behaviour. Separate from the
/// agent memory, which only keeps short notes fed back into the prompt.
pub trait AuditLog {
    /// Fire-and-forget; implementations swallow their own failures.
    fn record(&mut self, prompt: &str, raw_response: &str, action: &Action);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    pub response: String,
    pub action: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ConversationLog {
    path: PathBuf,
}

impl ConversationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, record: &ConversationRecord) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()))
    }
}

impl AuditLog for ConversationLog {
    fn record(&mut self, prompt: &str, raw_response: &str, action: &Action) {
        let record = ConversationRecord {
            timestamp: Utc::now(),
            prompt: prompt.to_string(),
            response: raw_response.to_string(),
            action: action.action.clone(),
            reason: action.reason.clone(),
        };
        if let Err(err) = self.append(&record) {
            warn!(path = %self.path.display(), error = %err, "failed to write conversation log");
        }
    }
}
