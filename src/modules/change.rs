use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::modules::snapshot::Snapshot;

/// Content hash of a snapshot. Object keys are serialized in sorted order, so the
/// hash does not depend on field order in the exported file.
pub fn fingerprint(snapshot: &Snapshot) -> String {
    let canonical = match serde_json::to_value(snapshot) {
        Ok(value) => value.to_string(),
        Err(err) => {
            warn!(error = %err, "snapshot not serializable; using debug form for fingerprint");
            format!("{:?}", snapshot)
        }
    };
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Novelty gate plus the two edge-triggered world transitions.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    last_fingerprint: Option<String>,
    last_day: i64,
    last_health: f64,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self {
            last_fingerprint: None,
            last_day: -1,
            last_health: 100.0,
        }
    }
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_changed(&mut self, snapshot: &Snapshot) -> bool {
        let current = fingerprint(snapshot);
        if self.last_fingerprint.as_deref() == Some(current.as_str()) {
            return false;
        }
        self.last_fingerprint = Some(current);
        true
    }

    /// True only on the tick where the day counter drops back to 1.
    pub fn is_world_reset(&mut self, snapshot: &Snapshot) -> bool {
        let reset = snapshot.day == 1 && self.last_day > 1;
        if reset {
            info!(previous_day = self.last_day, "world reset detected");
        }
        self.last_day = snapshot.day;
        reset
    }

    /// True only on the tick where health first reaches zero.
    pub fn is_game_over(&mut self, snapshot: &Snapshot) -> bool {
        let dead = snapshot.health <= 0.0 && self.last_health > 0.0;
        if dead {
            info!("game over detected");
        }
        self.last_health = snapshot.health;
        dead
    }
}
