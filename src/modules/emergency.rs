use tracing::warn;

use crate::modules::action::{Action, EAT_FOOD, EXPLORE, RUN_FROM_ENEMY};
use crate::modules::snapshot::Snapshot;

pub const CRITICAL_HEALTH: f64 = 20.0;
pub const DUSK: f64 = 0.75;
pub const LIGHT_SOURCE: &str = "torch";

/// Hardcoded safety overrides, checked before the model is consulted.
/// First match wins: low health, then an active threat, then dusk without light.
pub fn evaluate(snapshot: &Snapshot) -> Option<Action> {
    if snapshot.health < CRITICAL_HEALTH {
        warn!(health = snapshot.health, "health critically low");
        return Some(Action::new(EAT_FOOD, "Health critically low"));
    }

    if let Some(threat) = snapshot.threats.first() {
        warn!(threat = %threat.name, distance = threat.distance, "hostile nearby");
        return Some(Action::new(
            RUN_FROM_ENEMY,
            format!("Hostile {} at {}m", threat.name, threat.distance),
        ));
    }

    if snapshot.time_of_day > DUSK && snapshot.equipped_item() != LIGHT_SOURCE {
        warn!(time_of_day = snapshot.time_of_day, "dusk without a light source");
        return Some(Action::new(EXPLORE, "Dusk approaching, no light source"));
    }

    None
}
