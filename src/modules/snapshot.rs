use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_MAX_HEALTH: f64 = 100.0;
pub const DEFAULT_MAX_HUNGER: f64 = 150.0;
pub const DEFAULT_MAX_SANITY: f64 = 200.0;

fn default_health() -> f64 {
    DEFAULT_MAX_HEALTH
}

fn default_hunger() -> f64 {
    DEFAULT_MAX_HUNGER
}

fn default_sanity() -> f64 {
    DEFAULT_MAX_SANITY
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Autumn,
    Winter,
    Spring,
    Summer,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Season::Autumn => "autumn",
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Ground-plane position as exported by the game (y is height and not tracked).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub z: f64,
}

/// An entity inside the sensor radius. Threats share the same shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(default = "unknown_name", rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub distance: f64,
}

fn unknown_name() -> String {
    "unknown".to_string()
}

/// One tick's exported world/agent state. Decoding is lenient: anything the exporter
/// leaves out falls back to a neutral default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_health")]
    pub health: f64,
    #[serde(default = "default_hunger")]
    pub hunger: f64,
    #[serde(default = "default_sanity")]
    pub sanity: f64,
    #[serde(default = "default_health")]
    pub max_health: f64,
    #[serde(default = "default_hunger")]
    pub max_hunger: f64,
    #[serde(default = "default_sanity")]
    pub max_sanity: f64,
    #[serde(default)]
    pub day: i64,
    #[serde(default)]
    pub time_of_day: f64,
    #[serde(default)]
    pub season: Season,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub equipped: Option<String>,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub nearby_entities: Vec<Sighting>,
    #[serde(default)]
    pub threats: Vec<Sighting>,
    #[serde(default)]
    pub speech_log: Vec<String>,
    #[serde(default)]
    pub action_log: Vec<String>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            health: DEFAULT_MAX_HEALTH,
            hunger: DEFAULT_MAX_HUNGER,
            sanity: DEFAULT_MAX_SANITY,
            max_health: DEFAULT_MAX_HEALTH,
            max_hunger: DEFAULT_MAX_HUNGER,
            max_sanity: DEFAULT_MAX_SANITY,
            day: 1,
            time_of_day: 0.0,
            season: Season::Unknown,
            position: Position::default(),
            equipped: None,
            inventory: Vec::new(),
            nearby_entities: Vec::new(),
            threats: Vec::new(),
            speech_log: Vec::new(),
            action_log: Vec::new(),
        }
    }
}

impl Snapshot {
    pub fn equipped_item(&self) -> &str {
        self.equipped.as_deref().unwrap_or("")
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }
}

pub trait SnapshotSource {
    /// Latest snapshot, or `None` when it is missing or unreadable.
    fn read(&mut self) -> Option<Snapshot>;
}

#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for FileSnapshotSource {
    fn read(&mut self) -> Option<Snapshot> {
        if !self.path.exists() {
            warn!(path = %self.path.display(), "state file not found");
            return None;
        }
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read state file");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "invalid state json");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_json_takes_defaults() {
        let snapshot: Snapshot = serde_json::from_str(r#"{"day": 3, "season": "winter"}"#).unwrap();
        assert_eq!(snapshot.day, 3);
        assert_eq!(snapshot.season, Season::Winter);
        assert_eq!(snapshot.health, 100.0);
        assert_eq!(snapshot.max_hunger, 150.0);
        assert!(snapshot.inventory.is_empty());
        assert_eq!(snapshot.equipped_item(), "");
    }

    #[test]
    fn unrecognised_season_is_unknown() {
        let snapshot: Snapshot = serde_json::from_str(r#"{"season": "monsoon"}"#).unwrap();
        assert_eq!(snapshot.season, Season::Unknown);
    }

    #[test]
    fn sightings_decode_type_field() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{"nearby_entities": [{"name": "evergreen", "type": "tree", "distance": 4.5}]}"#,
        )
        .unwrap();
        assert_eq!(snapshot.nearby_entities[0].kind, "tree");
        assert_eq!(snapshot.nearby_entities[0].distance, 4.5);
    }

    #[test]
    fn file_source_is_silent_on_missing_and_corrupt_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game_state.json");
        let mut source = FileSnapshotSource::new(&path);
        assert!(source.read().is_none());

        fs::write(&path, b"{not json").unwrap();
        assert!(source.read().is_none());

        fs::write(&path, br#"{"health": 42, "day": 2}"#).unwrap();
        let snapshot = source.read().unwrap();
        assert_eq!(snapshot.health, 42.0);
        assert_eq!(snapshot.day, 2);
    }
}
