//! Error taxonomy. Everything here is fatal to the process; tolerated races and
//! arithmetic anomalies are resolved where they happen and never become errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetricsError>;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot read socket table {path}: {source}")]
    SocketTable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read process-info root {path}: {source}")]
    ProcRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("arena growth failed (requested {requested} bytes)")]
    ArenaGrowth { requested: usize },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl MetricsError {
    pub fn config(msg: impl Into<String>) -> Self {
        MetricsError::Config(msg.into())
    }
}
