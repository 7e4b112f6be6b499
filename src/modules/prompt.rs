use std::cmp::Ordering;
use std::fmt::Write as _;

use crate::modules::catalog::Catalog;
use crate::modules::inventory::InventoryMap;
use crate::modules::memory::MemoryEntry;
use crate::modules::snapshot::{Sighting, Snapshot};

/// Stats below this are flagged CRITICAL in the status block.
pub const CRITICAL_THRESHOLD: f64 = 50.0;
pub const NEARBY_LIMIT: usize = 5;
pub const MEMORY_LIMIT: usize = 8;
pub const FEEDBACK_LOG_LIMIT: usize = 5;
const INVENTORY_LINE_LIMIT: usize = 200;

/// Tools that gate a gathering action.
const TOOL_GATES: &[(&str, &str)] = &[("axe", "chop_tree"), ("pickaxe", "mine_rock")];

pub const SYSTEM_RULES: &str = "You are Wilson in Don't Starve. You must survive by gathering resources, cooking food, and managing your health.

CRITICAL RULES:
- DARKNESS KILLS YOU. Always have a fire before night or you die.
- Stats below 50 are CRITICAL and require immediate action. Stats above 50 are safe, do not waste food or resources.
- Hunger max is 150. Only eat if hunger < 50. Eating at 119/150 is wasteful.
- Health max is 100. Only heal if health < 50.
- Sanity max is 200. Only address sanity if sanity < 50.
- Build tools (axe, pickaxe) to gather resources efficiently.
- Seasons change: autumn (safe) -> winter (cold, scarce food) -> spring (rain) -> summer (heat)";

const REPLY_CONTRACT: &str = "IMPORTANT: Respond ONLY with valid JSON in this format:
{
  \"action\": \"action_name\",
  \"reason\": \"Why you chose this action\"
}

Do NOT include any text outside the JSON.";

/// Everything one prompt is rendered from. Borrowed; the builder never mutates it.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub snapshot: &'a Snapshot,
    pub memory: &'a [MemoryEntry],
    pub inventory: &'a InventoryMap,
    pub last_action: Option<&'a str>,
    /// `None` until there is a previous action whose effect could be observed.
    pub last_action_changed: Option<bool>,
    pub world_summary: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    catalog: Catalog,
}

fn stat_label(value: f64, max: f64) -> String {
    let flag = if value < CRITICAL_THRESHOLD {
        "[CRITICAL]"
    } else {
        "[OK]"
    };
    format!("{:.0}/{:.0} {}", value, max, flag)
}

fn clip(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        return text;
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Closest `n` sightings; ties keep exporter order.
fn nearest(entities: &[Sighting], n: usize) -> Vec<&Sighting> {
    let mut sorted: Vec<&Sighting> = entities.iter().collect();
    sorted.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    sorted.truncate(n);
    sorted
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

impl PromptBuilder {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn build(&self, ctx: &PromptContext<'_>) -> String {
        let s = ctx.snapshot;
        let mut out = String::new();

        out.push_str(SYSTEM_RULES);
        out.push_str("\n\nCURRENT STATUS:\n");
        let _ = writeln!(
            out,
            "- Day: {}, Time: {:.2} (0.75+ = dusk/night)",
            s.day, s.time_of_day
        );
        let _ = writeln!(out, "- Season: {}", s.season);
        let _ = writeln!(out, "- Health: {}", stat_label(s.health, s.max_health));
        let _ = writeln!(out, "- Hunger: {}", stat_label(s.hunger, s.max_hunger));
        let _ = writeln!(out, "- Sanity: {}", stat_label(s.sanity, s.max_sanity));
        let _ = writeln!(
            out,
            "- Position: ({:.1}, {:.1})",
            s.position.x, s.position.z
        );
        let equipped = match s.equipped_item() {
            "" => "nothing",
            item => item,
        };
        let _ = writeln!(out, "- Equipped: {}", equipped);
        let _ = writeln!(out, "- Inventory: {}", self.inventory_line(ctx.inventory));

        out.push('\n');
        if s.nearby_entities.is_empty() {
            out.push_str("No nearby entities\n");
        } else {
            out.push_str("NEARBY ENTITIES:\n");
            for e in nearest(&s.nearby_entities, NEARBY_LIMIT) {
                let _ = writeln!(out, "  * {} ({}) - {}m away", e.name, e.kind, e.distance);
            }
        }

        out.push_str("\nTOOLS & PREREQUISITES:\n");
        out.push_str(&self.prerequisites(ctx.inventory, s));

        out.push('\n');
        out.push_str(&Self::feedback(ctx.last_action, ctx.last_action_changed));

        if !ctx.world_summary.is_empty() {
            let _ = writeln!(
                out,
                "RECENTLY SEEN (now out of view): {}",
                ctx.world_summary
            );
        }

        if !s.speech_log.is_empty() {
            out.push_str("\nRECENT SPEECH:\n");
            for line in tail(&s.speech_log, FEEDBACK_LOG_LIMIT) {
                let _ = writeln!(out, "  - {}", line);
            }
        }
        if !s.action_log.is_empty() {
            out.push_str("\nACTION RESULTS:\n");
            for line in tail(&s.action_log, FEEDBACK_LOG_LIMIT) {
                let _ = writeln!(out, "  - {}", line);
            }
        }

        if !s.threats.is_empty() {
            let names: Vec<&str> = s.threats.iter().map(|t| t.name.as_str()).collect();
            let _ = writeln!(out, "\nTHREATS NEARBY: {}", names.join(", "));
        }

        if !ctx.memory.is_empty() {
            out.push_str("\nRecent events:\n");
            for entry in tail(ctx.memory, MEMORY_LIMIT) {
                let _ = writeln!(out, "  - [{}] {}", entry.source, entry.text);
            }
        }

        let _ = write!(
            out,
            "\nYour action options: {}\n\n{}",
            self.catalog.actions.join(", "),
            REPLY_CONTRACT
        );
        out
    }

    fn inventory_line(&self, inventory: &InventoryMap) -> String {
        if inventory.is_empty() {
            return "empty".to_string();
        }
        let line = inventory
            .iter()
            .map(|(name, count)| format!("{} x{}", name, count))
            .collect::<Vec<_>>()
            .join(", ");
        clip(line, INVENTORY_LINE_LIMIT)
    }

    fn prerequisites(&self, inventory: &InventoryMap, snapshot: &Snapshot) -> String {
        let has = |tool: &str| {
            inventory.get(tool).copied().unwrap_or(0) > 0 || snapshot.equipped_item() == tool
        };
        let mut out = String::new();

        for &(tool, _) in TOOL_GATES {
            if has(tool) {
                let _ = writeln!(out, "  {}: have it", tool);
            } else {
                match self.catalog.recipe(tool) {
                    Some(recipe) => {
                        let _ = writeln!(
                            out,
                            "  {}: missing, craft_item:{} needs {}",
                            tool,
                            tool,
                            recipe.describe_ingredients()
                        );
                    }
                    None => {
                        let _ = writeln!(out, "  {}: missing", tool);
                    }
                }
            }
        }

        let craftable = self.catalog.craftable(inventory);
        if !craftable.is_empty() {
            let _ = writeln!(out, "  Can craft now: {}", craftable.join(", "));
        }

        for &(tool, action) in TOOL_GATES {
            if !has(tool) {
                let _ = writeln!(
                    out,
                    "  ! {} requires a{} {}, craft or find one first",
                    action,
                    if tool.starts_with(['a', 'e', 'i', 'o', 'u']) { "n" } else { "" },
                    tool
                );
            }
        }
        out
    }

    fn feedback(last_action: Option<&str>, changed: Option<bool>) -> String {
        match last_action {
            None => "LAST ACTION: none yet\n".to_string(),
            Some(action) => {
                let effect = match changed {
                    Some(true) => "the world changed afterwards",
                    Some(false) => "nothing changed afterwards, try something else",
                    None => "effect unknown",
                };
                format!("LAST ACTION: {} ({})\n", action, effect)
            }
        }
    }
}
