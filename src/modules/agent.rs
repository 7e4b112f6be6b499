use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::modules::action::{Action, ActionSink, FileActionSink};
use crate::modules::audit::{AuditLog, ConversationLog};
use crate::modules::catalog::ActionKind;
use crate::modules::change::ChangeDetector;
use crate::modules::config::AgentConfig;
use crate::modules::emergency;
use crate::modules::inventory::{InventoryTracker, parse_inventory};
use crate::modules::llm::{LlmClient, ModelService};
use crate::modules::memory::{
    AgentMemory, JsonlMemoryStore, SOURCE_LLM_REASON, SOURCE_SYSTEM,
};
use crate::modules::parser;
use crate::modules::prompt::{PromptBuilder, PromptContext};
use crate::modules::snapshot::{FileSnapshotSource, Snapshot, SnapshotSource};
use crate::modules::state::{RuntimeFile, RuntimeState, Status};
use crate::modules::world_memory::WorldMemory;

pub const NO_STATE_REASON: &str = "No game state available";
pub const GAME_OVER_REASON: &str = "Game over — waiting for new world";
const DEATH_NOTE: &str = "You died. Cleared stale memory.";
const RESET_NOTE: &str = "World reset! Starting fresh.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionPath {
    Emergency,
    Model,
}

/// What one tick did. Only `Unchanged` and `Dead` write nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    NoState(Action),
    Unchanged,
    GameOver(Action),
    Dead,
    Decided {
        action: Action,
        via: DecisionPath,
        world_reset: bool,
    },
}

impl TickOutcome {
    pub fn action(&self) -> Option<&Action> {
        match self {
            TickOutcome::NoState(action) | TickOutcome::GameOver(action) => Some(action),
            TickOutcome::Decided { action, .. } => Some(action),
            TickOutcome::Unchanged | TickOutcome::Dead => None,
        }
    }
}

/// External ends of the pipeline.
pub struct Collaborators {
    pub source: Box<dyn SnapshotSource>,
    pub sink: Box<dyn ActionSink>,
    pub model: Box<dyn ModelService>,
    pub audit: Option<Box<dyn AuditLog>>,
}

/// Owns every piece of per-run state and turns snapshots into actions, one tick at a
/// time. Nothing here is shared, so a test can build as many isolated agents as it likes.
pub struct SurvivalAgent {
    io: Collaborators,
    memory: AgentMemory,
    inventory: InventoryTracker,
    world: WorldMemory,
    detector: ChangeDetector,
    prompt: PromptBuilder,
    decisions: u64,
    last_action: Option<String>,
    last_action_changed: Option<bool>,
}

impl SurvivalAgent {
    pub fn new(
        io: Collaborators,
        memory: AgentMemory,
        world: WorldMemory,
        prompt: PromptBuilder,
    ) -> Self {
        Self {
            io,
            memory,
            inventory: InventoryTracker::new(),
            world,
            detector: ChangeDetector::new(),
            prompt,
            decisions: 0,
            last_action: None,
            last_action_changed: None,
        }
    }

    /// Wires the file-backed collaborators and the HTTP model client.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        config.validate()?;
        config.paths.ensure()?;
        let catalog = config.load_catalog()?;
        let client = LlmClient::new(config.llm.clone())?;
        let paths = &config.paths;

        let io = Collaborators {
            source: Box::new(FileSnapshotSource::new(paths.game_state())),
            sink: Box::new(FileActionSink::new(paths.action_command())),
            model: Box::new(client),
            audit: Some(Box::new(ConversationLog::new(paths.conversation_log()))),
        };
        let memory = AgentMemory::open(
            Box::new(JsonlMemoryStore::new(paths.memory_log())),
            config.memory_cap,
        );
        let world = WorldMemory::new(config.world_ttl, config.world_max_entries);
        Ok(Self::new(io, memory, world, PromptBuilder::new(catalog)))
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn world_memory(&self) -> &WorldMemory {
        &self.world
    }

    pub fn decisions(&self) -> u64 {
        self.decisions
    }

    pub fn last_action(&self) -> Option<&str> {
        self.last_action.as_deref()
    }

    pub fn last_action_changed(&self) -> Option<bool> {
        self.last_action_changed
    }

    pub fn model_name(&self) -> String {
        self.io.model.describe()
    }

    pub fn read_snapshot(&mut self) -> Option<Snapshot> {
        self.io.source.read()
    }

    pub fn decide(&mut self) -> TickOutcome {
        self.decide_at(Utc::now())
    }

    pub fn decide_at(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let Some(snapshot) = self.io.source.read() else {
            info!("cannot read game state, idling");
            return TickOutcome::NoState(self.emit(Action::idle(NO_STATE_REASON)));
        };

        if !self.detector.has_changed(&snapshot) {
            debug!("state unchanged, skipping decision");
            if self.last_action.is_some() {
                self.last_action_changed = Some(false);
            }
            return TickOutcome::Unchanged;
        }
        self.last_action_changed = self.last_action.as_ref().map(|_| true);

        if self.detector.is_game_over(&snapshot) {
            self.forget(DEATH_NOTE);
            return TickOutcome::GameOver(self.emit(Action::idle(GAME_OVER_REASON)));
        }

        if snapshot.is_dead() {
            info!("dead, waiting for new world");
            return TickOutcome::Dead;
        }

        let world_reset = self.detector.is_world_reset(&snapshot);
        if world_reset {
            self.forget(RESET_NOTE);
        }

        let inventory = self.inventory.update(&snapshot, &mut self.memory);
        self.world.update_at(&snapshot, now);

        if let Some(action) = emergency::evaluate(&snapshot) {
            return TickOutcome::Decided {
                action: self.emit(action),
                via: DecisionPath::Emergency,
                world_reset,
            };
        }

        let window = self.memory.recent(self.memory.cap());
        let world_summary = self.world.summary_at(&snapshot, now);
        let prompt = self.prompt.build(&PromptContext {
            snapshot: &snapshot,
            memory: &window,
            inventory: &inventory,
            last_action: self.last_action.as_deref(),
            last_action_changed: self.last_action_changed,
            world_summary: &world_summary,
        });

        let raw = self.io.model.generate(&prompt);
        let action = parser::parse(raw.as_deref());
        if let Some(audit) = self.io.audit.as_mut() {
            audit.record(&prompt, raw.as_deref().unwrap_or(""), &action);
        }

        if let ActionKind::Unknown(name) = self.prompt.catalog().classify(&action.action) {
            warn!(action = %name, "model chose an action outside the vocabulary");
        }
        if !action.is_idle() {
            self.memory.add(action.reason.clone(), SOURCE_LLM_REASON);
        }
        self.decisions += 1;

        TickOutcome::Decided {
            action: self.emit(action),
            via: DecisionPath::Model,
            world_reset,
        }
    }

    /// Renders the prompt the model would see for `snapshot`, without touching any state.
    pub fn preview_prompt(&self, snapshot: &Snapshot) -> String {
        let inventory = parse_inventory(&snapshot.inventory);
        let window = self.memory.recent(self.memory.cap());
        let world_summary = self.world.summary(snapshot);
        self.prompt.build(&PromptContext {
            snapshot,
            memory: &window,
            inventory: &inventory,
            last_action: self.last_action.as_deref(),
            last_action_changed: self.last_action_changed,
            world_summary: &world_summary,
        })
    }

    /// Polls until `ticks` run out or another process marks the runtime stopped.
    /// Each tick completes before the stop flag is checked.
    pub fn run(
        &mut self,
        interval: Duration,
        ticks: Option<u64>,
        runtime: &RuntimeFile,
    ) -> Result<u64, AgentError> {
        info!(model = %self.model_name(), interval_secs = interval.as_secs_f64(), "agent starting");
        runtime.save(&RuntimeState {
            status: Status::Running,
            decisions: self.decisions,
            last_action: self.last_action.clone(),
            message: Some("agent loop running".into()),
        })?;

        let mut remaining = ticks;
        let mut ran = 0u64;
        while remaining != Some(0) {
            let outcome = self.decide();
            ran += 1;

            if runtime.stop_requested() {
                info!("stop requested");
                break;
            }

            if outcome.action().is_some() {
                let state = RuntimeState {
                    status: Status::Running,
                    decisions: self.decisions,
                    last_action: self.last_action.clone(),
                    message: Some("agent loop running".into()),
                };
                if let Err(err) = runtime.save(&state) {
                    warn!(error = %err, "failed to update runtime state");
                }
            }

            if let Some(n) = remaining.as_mut() {
                *n -= 1;
                if *n == 0 {
                    break;
                }
            }

            std::thread::sleep(interval);
        }

        info!(decisions = self.decisions, ticks = ran, "agent stopped");
        runtime.save(&RuntimeState {
            status: Status::Stopped,
            decisions: self.decisions,
            last_action: self.last_action.clone(),
            message: Some(format!("completed {} tick(s)", ran)),
        })?;
        Ok(ran)
    }

    fn forget(&mut self, note: &str) {
        self.memory.clear();
        self.memory.add(note, SOURCE_SYSTEM);
        self.inventory.reset();
        self.world.reset();
    }

    fn emit(&mut self, action: Action) -> Action {
        self.last_action = Some(action.action.clone());
        if let Err(err) = self.io.sink.write(&action) {
            warn!(error = %err, action = %action.action, "failed to write action");
        }
        action
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    use super::*;
    use crate::modules::snapshot::Sighting;

    struct Script(VecDeque<Option<Snapshot>>);

    impl SnapshotSource for Script {
        fn read(&mut self) -> Option<Snapshot> {
            self.0.pop_front().flatten()
        }
    }

    #[derive(Clone, Default)]
    struct Written(Rc<RefCell<Vec<Action>>>);

    impl ActionSink for Written {
        fn write(&mut self, action: &Action) -> io::Result<()> {
            self.0.borrow_mut().push(action.clone());
            Ok(())
        }
    }

    struct BrokenSink;

    impl ActionSink for BrokenSink {
        fn write(&mut self, _action: &Action) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
    }

    #[derive(Clone, Default)]
    struct Model {
        reply: Option<String>,
        prompts: Rc<RefCell<Vec<String>>>,
    }

    impl ModelService for Model {
        fn generate(&self, prompt: &str) -> Option<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.reply.clone()
        }
    }

    fn agent(snapshots: Vec<Option<Snapshot>>, model: Model, sink: Box<dyn ActionSink>) -> SurvivalAgent {
        SurvivalAgent::new(
            Collaborators {
                source: Box::new(Script(snapshots.into())),
                sink,
                model: Box::new(model),
                audit: None,
            },
            AgentMemory::in_memory(20),
            WorldMemory::default(),
            PromptBuilder::default(),
        )
    }

    fn day(day: i64) -> Snapshot {
        Snapshot {
            day,
            time_of_day: 0.2,
            ..Snapshot::default()
        }
    }

    fn replying(text: &str) -> Model {
        Model {
            reply: Some(text.to_string()),
            ..Model::default()
        }
    }

    #[test]
    fn missing_snapshot_emits_idle() {
        let written = Written::default();
        let mut agent = agent(vec![None], Model::default(), Box::new(written.clone()));
        assert_eq!(
            agent.decide(),
            TickOutcome::NoState(Action::idle(NO_STATE_REASON))
        );
        assert_eq!(written.0.borrow().len(), 1);
        assert_eq!(agent.decisions(), 0);
    }

    #[test]
    fn unchanged_snapshot_writes_nothing_and_marks_feedback() {
        let written = Written::default();
        let model = replying(r#"{"action": "explore", "reason": "look around"}"#);
        let mut agent = agent(
            vec![Some(day(2)), Some(day(2)), Some(day(3))],
            model.clone(),
            Box::new(written.clone()),
        );

        assert!(matches!(agent.decide(), TickOutcome::Decided { via: DecisionPath::Model, .. }));
        assert_eq!(agent.last_action_changed(), None);

        assert_eq!(agent.decide(), TickOutcome::Unchanged);
        assert_eq!(agent.last_action_changed(), Some(false));
        assert_eq!(written.0.borrow().len(), 1);

        agent.decide();
        assert_eq!(agent.last_action_changed(), Some(true));
        let prompts = model.prompts.borrow();
        assert!(prompts[0].contains("LAST ACTION: none yet"));
        assert!(prompts[1].contains("LAST ACTION: explore (the world changed afterwards)"));
    }

    #[test]
    fn death_edge_clears_memory_then_waits() {
        let written = Written::default();
        let alive = Snapshot {
            nearby_entities: vec![Sighting {
                name: "pig".into(),
                kind: "creature".into(),
                distance: 2.0,
            }],
            ..day(4)
        };
        let dead = Snapshot {
            health: 0.0,
            ..day(4)
        };
        let still_dead = Snapshot {
            health: 0.0,
            time_of_day: 0.3,
            ..day(4)
        };
        let mut agent = agent(
            vec![Some(alive), Some(dead), Some(still_dead)],
            replying(r#"{"action":"explore","reason":"scout"}"#),
            Box::new(written.clone()),
        );

        agent.decide();
        assert_eq!(agent.world_memory().len(), 1);

        assert_eq!(
            agent.decide(),
            TickOutcome::GameOver(Action::idle(GAME_OVER_REASON))
        );
        assert!(agent.world_memory().is_empty());
        let notes: Vec<_> = agent.memory().entries().map(|e| e.source.clone()).collect();
        assert_eq!(notes, vec![SOURCE_SYSTEM.to_string()]);

        assert_eq!(agent.decide(), TickOutcome::Dead);
        assert_eq!(written.0.borrow().len(), 2);
    }

    #[test]
    fn emergency_skips_model() {
        let model = replying(r#"{"action":"chop_tree","reason":"wood"}"#);
        let hurt = Snapshot {
            health: 10.0,
            ..day(2)
        };
        let mut agent = agent(vec![Some(hurt)], model.clone(), Box::new(Written::default()));
        let outcome = agent.decide();
        assert_eq!(
            outcome,
            TickOutcome::Decided {
                action: Action::new("eat_food", "Health critically low"),
                via: DecisionPath::Emergency,
                world_reset: false,
            }
        );
        assert!(model.prompts.borrow().is_empty());
        assert_eq!(agent.decisions(), 0);
    }

    #[test]
    fn unreachable_model_falls_back_to_idle_without_memory_note() {
        let mut agent = agent(vec![Some(day(2))], Model::default(), Box::new(Written::default()));
        let outcome = agent.decide();
        assert_eq!(outcome.action(), Some(&Action::fallback()));
        assert!(agent.memory().is_empty());
        assert_eq!(agent.decisions(), 1);
    }

    #[test]
    fn sink_failure_does_not_stop_decisions() {
        let mut agent = agent(
            vec![Some(day(2))],
            replying(r#"{"action":"explore","reason":"scout"}"#),
            Box::new(BrokenSink),
        );
        assert_eq!(
            agent.decide().action(),
            Some(&Action::new("explore", "scout"))
        );
        assert_eq!(agent.last_action(), Some("explore"));
    }

    #[test]
    fn preview_does_not_mutate() {
        let mut agent = agent(vec![], Model::default(), Box::new(Written::default()));
        let snapshot = Snapshot {
            inventory: vec!["log x3".into()],
            ..day(2)
        };
        let prompt = agent.preview_prompt(&snapshot);
        assert!(prompt.contains("- Inventory: log x3"));
        assert!(agent.memory().is_empty());
        assert_eq!(agent.decide(), TickOutcome::NoState(Action::idle(NO_STATE_REASON)));
    }

    #[test]
    fn bounded_run_stops_after_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = RuntimeFile::new(dir.path().join("runtime.json"));
        let mut agent = agent(
            vec![Some(day(2)), Some(day(3))],
            replying(r#"{"action":"explore","reason":"scout"}"#),
            Box::new(Written::default()),
        );
        let ran = agent
            .run(Duration::from_millis(1), Some(2), &runtime)
            .unwrap();
        assert_eq!(ran, 2);
        let state = runtime.load().unwrap().unwrap();
        assert_eq!(state.status, Status::Stopped);
        assert_eq!(state.decisions, 2);
        assert_eq!(state.last_action.as_deref(), Some("explore"));
    }

    #[test]
    fn zero_ticks_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = RuntimeFile::new(dir.path().join("runtime.json"));
        let written = Written::default();
        let model = replying(r#"{"action":"explore","reason":"scout"}"#);
        let mut agent = agent(vec![Some(day(2))], model.clone(), Box::new(written.clone()));

        let ran = agent.run(Duration::from_millis(1), Some(0), &runtime).unwrap();
        assert_eq!(ran, 0);
        assert!(written.0.borrow().is_empty());
        assert!(model.prompts.borrow().is_empty());
        assert_eq!(runtime.load().unwrap().unwrap().status, Status::Stopped);
    }

    /// Marks the runtime stopped while serving its first snapshot, as `survivor stop` would.
    struct StopOnRead {
        runtime: RuntimeFile,
        reads: Rc<RefCell<u32>>,
    }

    impl SnapshotSource for StopOnRead {
        fn read(&mut self) -> Option<Snapshot> {
            *self.reads.borrow_mut() += 1;
            self.runtime.set_status(Status::Stopped, None).unwrap();
            Some(day(2))
        }
    }

    #[test]
    fn external_stop_ends_unbounded_run_after_current_tick() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = RuntimeFile::new(dir.path().join("runtime.json"));
        let reads = Rc::new(RefCell::new(0));
        let written = Written::default();
        let mut agent = SurvivalAgent::new(
            Collaborators {
                source: Box::new(StopOnRead {
                    runtime: runtime.clone(),
                    reads: reads.clone(),
                }),
                sink: Box::new(written.clone()),
                model: Box::new(replying(r#"{"action":"explore","reason":"scout"}"#)),
                audit: None,
            },
            AgentMemory::in_memory(20),
            WorldMemory::default(),
            PromptBuilder::default(),
        );

        let ran = agent.run(Duration::from_millis(1), None, &runtime).unwrap();
        assert_eq!(ran, 1);
        assert_eq!(*reads.borrow(), 1);
        assert_eq!(*written.0.borrow(), vec![Action::new("explore", "scout")]);

        let state = runtime.load().unwrap().unwrap();
        assert_eq!(state.status, Status::Stopped);
        assert_eq!(state.decisions, 1);
    }

    #[test]
    fn unknown_action_is_still_emitted_and_remembered() {
        let written = Written::default();
        let mut agent = agent(
            vec![Some(day(2))],
            replying(r#"{"action":"dance","reason":"boost morale"}"#),
            Box::new(written.clone()),
        );

        let outcome = agent.decide();
        let expected = Action::new("dance", "boost morale");
        assert_eq!(
            outcome,
            TickOutcome::Decided {
                action: expected.clone(),
                via: DecisionPath::Model,
                world_reset: false,
            }
        );
        assert_eq!(*written.0.borrow(), vec![expected]);
        assert_eq!(agent.last_action(), Some("dance"));

        let last = agent.memory().recent(1);
        assert_eq!(last[0].source, SOURCE_LLM_REASON);
        assert_eq!(last[0].text, "boost morale");
    }
}
