use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AgentError;
use crate::modules::catalog::Catalog;
use crate::modules::llm::LlmSettings;
use crate::modules::memory::DEFAULT_MEMORY_CAP;
use crate::modules::world_memory::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL};

pub const DEFAULT_STATE_DIR: &str = "state";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Files exchanged with the game mod, all under one state directory.
#[derive(Debug, Clone)]
pub struct AgentPaths {
    pub state_dir: PathBuf,
}

impl AgentPaths {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn game_state(&self) -> PathBuf {
        self.state_dir.join("game_state.json")
    }

    pub fn action_command(&self) -> PathBuf {
        self.state_dir.join("action_command.json")
    }

    pub fn memory_log(&self) -> PathBuf {
        self.state_dir.join("agent_memory.jsonl")
    }

    pub fn conversation_log(&self) -> PathBuf {
        self.state_dir.join("conversation_log.jsonl")
    }

    pub fn runtime(&self) -> PathBuf {
        self.state_dir.join("runtime.json")
    }

    /// Creating the state directory is the one failure that stops startup.
    pub fn ensure(&self) -> Result<(), AgentError> {
        fs::create_dir_all(&self.state_dir).map_err(|source| AgentError::StateDir {
            path: self.state_dir.clone(),
            source,
        })
    }
}

impl Default for AgentPaths {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_DIR)
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub paths: AgentPaths,
    pub interval: Duration,
    pub world_ttl: Duration,
    pub world_max_entries: usize,
    pub memory_cap: usize,
    pub catalog: Option<PathBuf>,
    pub llm: LlmSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            paths: AgentPaths::default(),
            interval: DEFAULT_INTERVAL,
            world_ttl: DEFAULT_TTL,
            world_max_entries: DEFAULT_MAX_ENTRIES,
            memory_cap: DEFAULT_MEMORY_CAP,
            catalog: None,
            llm: LlmSettings::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.interval.is_zero() {
            return Err(AgentError::Config("interval must be greater than 0".into()));
        }
        if self.memory_cap == 0 {
            return Err(AgentError::Config("memory cap must be at least 1".into()));
        }
        if self.llm.timeout.is_zero() {
            return Err(AgentError::Config("llm timeout must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn load_catalog(&self) -> Result<Catalog, AgentError> {
        match &self.catalog {
            Some(path) => Catalog::load(path),
            None => Ok(Catalog::default()),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.paths.state_dir
    }
}
