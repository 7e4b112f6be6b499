//! Survival agent core: turns an exported game snapshot into one validated action
//! per tick, combining hardcoded safety overrides with a language-model decision.

pub mod error;
pub mod modules;

pub use error::AgentError;
pub use modules::action::{self, Action, ActionSink, FileActionSink};
pub use modules::agent::{Collaborators, DecisionPath, SurvivalAgent, TickOutcome};
pub use modules::audit::{AuditLog, ConversationLog, ConversationRecord};
pub use modules::catalog::{ACTION_SPACE, ActionKind, Catalog, Recipe};
pub use modules::change::{ChangeDetector, fingerprint};
pub use modules::config::{AgentConfig, AgentPaths, DEFAULT_STATE_DIR};
pub use modules::emergency;
pub use modules::inventory::{InventoryDelta, InventoryMap, InventoryTracker, parse_inventory};
pub use modules::llm::{LlmClient, LlmProvider, LlmSettings, ModelService};
pub use modules::logging;
pub use modules::memory::{
    AgentMemory, JsonlMemoryStore, MemoryEntry, MemoryStore, NullMemoryStore,
};
pub use modules::parser::parse as parse_action;
pub use modules::prompt::{PromptBuilder, PromptContext};
pub use modules::snapshot::{FileSnapshotSource, Position, Season, Sighting, Snapshot, SnapshotSource};
pub use modules::state::{RuntimeFile, RuntimeState, Status};
pub use modules::world_memory::{SeenEntity, WorldMemory};
