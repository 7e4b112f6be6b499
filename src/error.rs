use std::path::PathBuf;

use thiserror::Error;

/// Startup failures. Nothing a tick does is allowed to produce one of these.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("cannot create state directory {path}: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot build http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid catalog {path}: {reason}")]
    Catalog { path: PathBuf, reason: String },

    #[error("runtime state {path}: {reason}")]
    Runtime { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}
