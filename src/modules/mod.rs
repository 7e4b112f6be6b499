pub mod action;
pub mod agent;
pub mod audit;
pub mod catalog;
pub mod change;
pub mod config;
pub mod emergency;
pub mod inventory;
pub mod llm;
pub mod logging;
pub mod memory;
pub mod parser;
pub mod prompt;
pub mod snapshot;
pub mod state;
pub mod world_memory;
