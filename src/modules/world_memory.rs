use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::modules::snapshot::Snapshot;

pub const DEFAULT_TTL: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_ENTRIES: usize = 30;
/// Entities listed in the prompt summary line.
pub const SUMMARY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeenEntity {
    pub name: String,
    pub kind: String,
    pub last_seen: DateTime<Utc>,
    pub times_seen: u32,
}

/// Short-term memory of entities that were inside the sensor radius recently.
/// The exporter only reports what is close by, so anything the agent walks away
/// from vanishes from the raw snapshot; this keeps it around for `ttl`.
#[derive(Debug, Clone)]
pub struct WorldMemory {
    ttl: Duration,
    max_entries: usize,
    seen: HashMap<String, SeenEntity>,
}

impl Default for WorldMemory {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}

fn age(now: DateTime<Utc>, then: DateTime<Utc>) -> Duration {
    now.signed_duration_since(then).to_std().unwrap_or_default()
}

pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else {
        format!("{}m ago", secs / 60)
    }
}

impl WorldMemory {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            seen: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SeenEntity> {
        self.seen.get(name)
    }

    pub fn update(&mut self, snapshot: &Snapshot) {
        self.update_at(snapshot, Utc::now());
    }

    /// Ingests the current sightings, then expires anything older than the TTL.
    pub fn update_at(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) {
        for sighting in &snapshot.nearby_entities {
            self.seen
                .entry(sighting.name.clone())
                .and_modify(|entity| {
                    entity.last_seen = now;
                    entity.times_seen = entity.times_seen.saturating_add(1);
                })
                .or_insert_with(|| SeenEntity {
                    name: sighting.name.clone(),
                    kind: sighting.kind.clone(),
                    last_seen: now,
                    times_seen: 1,
                });
        }

        let ttl = self.ttl;
        let before = self.seen.len();
        self.seen.retain(|_, entity| age(now, entity.last_seen) <= ttl);

        if self.seen.len() > self.max_entries {
            let mut by_age: Vec<(String, DateTime<Utc>)> = self
                .seen
                .values()
                .map(|e| (e.name.clone(), e.last_seen))
                .collect();
            by_age.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            for (name, _) in by_age.into_iter().skip(self.max_entries) {
                self.seen.remove(&name);
            }
        }

        let evicted = before.saturating_sub(self.seen.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.seen.len(), "world memory expired entities");
        }
    }

    /// Remembered entities missing from the current snapshot, newest first.
    pub fn not_currently_visible(&self, snapshot: &Snapshot) -> Vec<SeenEntity> {
        self.not_currently_visible_at(snapshot, Utc::now())
    }

    pub fn not_currently_visible_at(
        &self,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
    ) -> Vec<SeenEntity> {
        let visible: HashSet<&str> = snapshot
            .nearby_entities
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        let mut past: Vec<SeenEntity> = self
            .seen
            .values()
            .filter(|e| !visible.contains(e.name.as_str()))
            .filter(|e| age(now, e.last_seen) <= self.ttl)
            .cloned()
            .collect();
        past.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.name.cmp(&b.name)));
        past.truncate(self.max_entries);
        past
    }

    pub fn summary(&self, snapshot: &Snapshot) -> String {
        self.summary_at(snapshot, Utc::now())
    }

    /// `"campfire (45s ago), berrybush (2m ago)"`, or empty when nothing is out of view.
    pub fn summary_at(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> String {
        self.not_currently_visible_at(snapshot, now)
            .iter()
            .take(SUMMARY_LIMIT)
            .map(|e| format!("{} ({})", e.name, format_age(age(now, e.last_seen))))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::snapshot::Sighting;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn seeing(names: &[&str]) -> Snapshot {
        Snapshot {
            nearby_entities: names
                .iter()
                .map(|n| Sighting {
                    name: n.to_string(),
                    kind: "thing".to_string(),
                    distance: 3.0,
                })
                .collect(),
            ..Snapshot::default()
        }
    }

    #[test]
    fn entity_survives_until_ttl_elapses() {
        let mut memory = WorldMemory::new(Duration::from_secs(120), 30);
        memory.update_at(&seeing(&["campfire"]), t(0));

        let empty = seeing(&[]);
        memory.update_at(&empty, t(119));
        let names: Vec<_> = memory
            .not_currently_visible_at(&empty, t(119))
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["campfire"]);

        memory.update_at(&empty, t(121));
        assert!(memory.not_currently_visible_at(&empty, t(121)).is_empty());
        assert!(memory.is_empty());
    }

    #[test]
    fn resighting_bumps_counter_and_timestamp() {
        let mut memory = WorldMemory::default();
        memory.update_at(&seeing(&["rabbit"]), t(0));
        memory.update_at(&seeing(&["rabbit"]), t(10));
        let rabbit = memory.get("rabbit").unwrap();
        assert_eq!(rabbit.times_seen, 2);
        assert_eq!(rabbit.last_seen, t(10));
    }

    #[test]
    fn visible_entities_are_excluded_and_order_is_newest_first() {
        let mut memory = WorldMemory::default();
        memory.update_at(&seeing(&["boulder"]), t(0));
        memory.update_at(&seeing(&["sapling"]), t(20));
        memory.update_at(&seeing(&["evergreen"]), t(30));

        let now = seeing(&["evergreen"]);
        let names: Vec<_> = memory
            .not_currently_visible_at(&now, t(40))
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["sapling", "boulder"]);
    }

    #[test]
    fn summary_switches_to_minutes_after_a_minute() {
        let mut memory = WorldMemory::default();
        memory.update_at(&seeing(&["berrybush"]), t(0));
        memory.update_at(&seeing(&["campfire"]), t(50));

        let summary = memory.summary_at(&seeing(&[]), t(95));
        assert_eq!(summary, "campfire (45s ago), berrybush (1m ago)");
        assert_eq!(memory.summary_at(&seeing(&["campfire", "berrybush"]), t(95)), "");
    }

    #[test]
    fn holds_at_most_max_entries() {
        let mut memory = WorldMemory::new(Duration::from_secs(120), 2);
        memory.update_at(&seeing(&["a"]), t(0));
        memory.update_at(&seeing(&["b"]), t(1));
        memory.update_at(&seeing(&["c"]), t(2));
        assert_eq!(memory.len(), 2);
        assert!(memory.get("a").is_none());
    }

    #[test]
    fn reset_forgets_everything() {
        let mut memory = WorldMemory::default();
        memory.update_at(&seeing(&["spider den"]), t(0));
        memory.reset();
        assert!(memory.is_empty());
    }
}
