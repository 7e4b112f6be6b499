use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Status {
    Initialized,
    Running,
    Stopped,
}

/// Status of the polling loop, shared with `status`/`stop` from other processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeState {
    pub status: Status,
    pub decisions: u64,
    pub last_action: Option<String>,
    pub message: Option<String>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            status: Status::Initialized,
            decisions: 0,
            last_action: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeFile {
    path: PathBuf,
}

impl RuntimeFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, reason: impl ToString) -> AgentError {
        AgentError::Runtime {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    pub fn load(&self) -> Result<Option<RuntimeState>, AgentError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path).map_err(|e| self.error(e))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        let state = serde_json::from_slice(&bytes).map_err(|e| {
            self.error(format!("failed to parse; delete it to reset: {}", e))
        })?;
        Ok(Some(state))
    }

    pub fn save(&self, state: &RuntimeState) -> Result<(), AgentError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }
        let json = serde_json::to_vec_pretty(state).map_err(|e| self.error(e))?;
        fs::write(&self.path, json).map_err(|e| self.error(e))
    }

    pub fn set_status(
        &self,
        status: Status,
        message: Option<String>,
    ) -> Result<RuntimeState, AgentError> {
        let mut state = self.load()?.unwrap_or_default();
        state.status = status;
        state.message = message;
        self.save(&state)?;
        Ok(state)
    }

    /// True when another process asked the loop to stop.
    pub fn stop_requested(&self) -> bool {
        matches!(self.load(), Ok(Some(RuntimeState { status: Status::Stopped, .. })))
    }
}
