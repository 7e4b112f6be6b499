use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

pub const IDLE: &str = "idle";
pub const EAT_FOOD: &str = "eat_food";
pub const RUN_FROM_ENEMY: &str = "run_from_enemy";
pub const EXPLORE: &str = "explore";
pub const CRAFT_PREFIX: &str = "craft_item:";

pub const FALLBACK_REASON: &str = "No decision made";

/// Terminal output of a tick, handed to the game as `{"action": ..., "reason": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub action: String,
    pub reason: String,
}

impl Action {
    pub fn new(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            reason: reason.into(),
        }
    }

    pub fn idle(reason: impl Into<String>) -> Self {
        Self::new(IDLE, reason)
    }

    /// What every failed decision collapses to.
    pub fn fallback() -> Self {
        Self::idle(FALLBACK_REASON)
    }

    pub fn is_idle(&self) -> bool {
        self.action == IDLE
    }

    /// Item named by a `craft_item:NAME` action.
    pub fn craft_target(&self) -> Option<&str> {
        self.action
            .strip_prefix(CRAFT_PREFIX)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

pub trait ActionSink {
    fn write(&mut self, action: &Action) -> io::Result<()>;
}

/// Overwrites a JSON file that the in-game executor polls.
#[derive(Debug, Clone)]
pub struct FileActionSink {
    path: PathBuf,
}

impl FileActionSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActionSink for FileActionSink {
    fn write(&mut self, action: &Action) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec(action)?;
        fs::write(&self.path, json)?;
        info!(
            action = %action.action,
            reason = %truncate(&action.reason, 120),
            "wrote action command"
        );
        Ok(())
    }
}

pub(crate) fn truncate(text: &str, max: usize) -> String {
    // Cut on char boundaries; model output regularly contains emoji.
    let mut chars = text.char_indices();
    let cutoff = match chars.nth(max) {
        Some((idx, _)) => idx,
        None => return text.to_string(),
    };
    format!("{}...", &text[..cutoff])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn craft_target_reads_parametric_form() {
        assert_eq!(Action::new("craft_item:axe", "x").craft_target(), Some("axe"));
        assert_eq!(Action::new("craft_item:", "x").craft_target(), None);
        assert_eq!(Action::new("chop_tree", "x").craft_target(), None);
    }

    #[test]
    fn file_sink_writes_action_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("action_command.json");
        let mut sink = FileActionSink::new(&path);
        sink.write(&Action::new("chop_tree", "need wood")).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["action"], "chop_tree");
        assert_eq!(value["reason"], "need wood");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("🔥🔥🔥", 2), "🔥🔥...");
    }
}
