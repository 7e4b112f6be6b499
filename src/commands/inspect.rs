use std::io::Read;
use std::path::PathBuf;

use survivor::{
    AgentConfig, AgentPaths, JsonlMemoryStore, MemoryStore, SurvivalAgent, parse_action,
};

pub(super) fn run_prompt(paths: AgentPaths, catalog: Option<PathBuf>) -> Result<(), String> {
    let config = AgentConfig {
        paths,
        catalog,
        ..AgentConfig::default()
    };
    let mut agent = SurvivalAgent::from_config(&config).map_err(|e| e.to_string())?;
    let snapshot = agent.read_snapshot().ok_or_else(|| {
        format!(
            "no readable game state at {}",
            config.paths.game_state().display()
        )
    })?;
    println!("{}", agent.preview_prompt(&snapshot));
    Ok(())
}

pub(super) fn run_parse() -> Result<(), String> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .map_err(|e| format!("read stdin: {}", e))?;
    let action = parse_action(Some(&raw));
    let json = serde_json::to_string_pretty(&action).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

pub(super) fn run_memory(paths: &AgentPaths, count: usize) -> Result<(), String> {
    let entries = JsonlMemoryStore::new(paths.memory_log())
        .load()
        .map_err(|e| e.to_string())?;
    if entries.is_empty() {
        println!("No memory recorded.");
        return Ok(());
    }
    let start = entries.len().saturating_sub(count);
    for entry in &entries[start..] {
        println!(
            "{} [{}] {}",
            entry.timestamp.to_rfc3339(),
            entry.source,
            entry.text
        );
    }
    Ok(())
}
