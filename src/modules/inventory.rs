use std::collections::{BTreeMap, BTreeSet};

use crate::modules::memory::{AgentMemory, SOURCE_INVENTORY};
use crate::modules::snapshot::Snapshot;

/// Item name to count. Ordered so prompt rendering and deltas are stable.
pub type InventoryMap = BTreeMap<String, u32>;

/// Parses one slot, `"log x20"` or `"axe"`.
pub fn parse_slot(slot: &str) -> (String, u32) {
    if let Some((name, count)) = slot.rsplit_once(" x") {
        if let Ok(count) = count.trim().parse::<u32>() {
            return (name.trim().to_string(), count);
        }
    }
    (slot.trim().to_string(), 1)
}

/// Stacks of the same item are summed.
pub fn parse_inventory(slots: &[String]) -> InventoryMap {
    let mut map = InventoryMap::new();
    for slot in slots {
        let (name, count) = parse_slot(slot);
        let total = map.entry(name).or_default();
        *total = total.saturating_add(count);
    }
    map
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryDelta {
    pub gained: Vec<(String, u32)>,
    pub lost: Vec<(String, u32)>,
}

impl InventoryDelta {
    pub fn between(previous: &InventoryMap, current: &InventoryMap) -> Self {
        let keys: BTreeSet<&String> = previous.keys().chain(current.keys()).collect();
        let mut delta = Self::default();
        for key in keys {
            let before = previous.get(key).copied().unwrap_or(0);
            let after = current.get(key).copied().unwrap_or(0);
            if after > before {
                delta.gained.push((key.clone(), after - before));
            } else if after < before {
                delta.lost.push((key.clone(), before - after));
            }
        }
        delta
    }

    pub fn is_empty(&self) -> bool {
        self.gained.is_empty() && self.lost.is_empty()
    }

    fn render(items: &[(String, u32)]) -> String {
        items
            .iter()
            .map(|(name, count)| format!("{} x{}", name, count))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Memory lines: `"Gained: log x3, twig x1"` and/or `"Lost: ..."`.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.gained.is_empty() {
            lines.push(format!("Gained: {}", Self::render(&self.gained)));
        }
        if !self.lost.is_empty() {
            lines.push(format!("Lost: {}", Self::render(&self.lost)));
        }
        lines
    }
}

#[derive(Debug, Clone, Default)]
pub struct InventoryTracker {
    previous: Option<InventoryMap>,
}

impl InventoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the map for this tick and logs gains/losses against the last one.
    pub fn update(&mut self, snapshot: &Snapshot, memory: &mut AgentMemory) -> InventoryMap {
        let current = parse_inventory(&snapshot.inventory);
        if let Some(previous) = &self.previous {
            for line in InventoryDelta::between(previous, &current).lines() {
                memory.add(line, SOURCE_INVENTORY);
            }
        }
        self.previous = Some(current.clone());
        current
    }

    pub fn current(&self) -> Option<&InventoryMap> {
        self.previous.as_ref()
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}
