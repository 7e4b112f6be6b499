use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::modules::action::CRAFT_PREFIX;
use crate::modules::inventory::InventoryMap;

/// Actions the in-game executor understands. `craft_item:NAME` is parametric.
pub const ACTION_SPACE: &[&str] = &[
    "move_to_food",
    "chop_tree",
    "mine_rock",
    "pick_up_item",
    "craft_item:NAME",
    "eat_food",
    "cook_food",
    "run_from_enemy",
    "attack_enemy",
    "explore",
    "idle",
];

const DEFAULT_RECIPES: &[(&str, &[(&str, u32)])] = &[
    ("axe", &[("twig", 1), ("flint", 1)]),
    ("pickaxe", &[("twig", 2), ("flint", 2)]),
    ("campfire", &[("log", 2), ("cutgrass", 2)]),
    ("torch", &[("twig", 2), ("cutgrass", 2)]),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub item: String,
    pub ingredients: BTreeMap<String, u32>,
}

impl Recipe {
    pub fn craftable_from(&self, inventory: &InventoryMap) -> bool {
        self.ingredients
            .iter()
            .all(|(name, need)| inventory.get(name).copied().unwrap_or(0) >= *need)
    }

    /// `"1 flint + 1 twig"`.
    pub fn describe_ingredients(&self) -> String {
        self.ingredients
            .iter()
            .map(|(name, need)| format!("{} {}", need, name))
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Known(String),
    Craft(String),
    Unknown(String),
}

/// Recipe table and action vocabulary. Data rather than code so the prompt can be
/// exercised against a substituted table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub recipes: Vec<Recipe>,
    pub actions: Vec<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        let recipes = DEFAULT_RECIPES
            .iter()
            .map(|(item, ingredients)| Recipe {
                item: item.to_string(),
                ingredients: ingredients
                    .iter()
                    .map(|(name, need)| (name.to_string(), *need))
                    .collect(),
            })
            .collect();
        Self {
            recipes,
            actions: ACTION_SPACE.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let bytes = fs::read(path).map_err(|source| AgentError::Catalog {
            path: path.to_path_buf(),
            reason: source.to_string(),
        })?;
        let catalog: Catalog =
            serde_json::from_slice(&bytes).map_err(|source| AgentError::Catalog {
                path: path.to_path_buf(),
                reason: source.to_string(),
            })?;
        if catalog.actions.is_empty() {
            return Err(AgentError::Catalog {
                path: path.to_path_buf(),
                reason: "action list is empty".into(),
            });
        }
        Ok(catalog)
    }

    pub fn recipe(&self, item: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.item == item)
    }

    pub fn craftable(&self, inventory: &InventoryMap) -> Vec<&str> {
        self.recipes
            .iter()
            .filter(|r| r.craftable_from(inventory))
            .map(|r| r.item.as_str())
            .collect()
    }

    pub fn classify(&self, action: &str) -> ActionKind {
        let action = action.trim();
        if let Some(item) = action.strip_prefix(CRAFT_PREFIX) {
            let item = item.trim();
            if !item.is_empty() && self.actions.iter().any(|a| a.starts_with(CRAFT_PREFIX)) {
                return ActionKind::Craft(item.to_string());
            }
        }
        if self
            .actions
            .iter()
            .any(|a| !a.starts_with(CRAFT_PREFIX) && a == action)
        {
            return ActionKind::Known(action.to_string());
        }
        ActionKind::Unknown(action.to_string())
    }
}
