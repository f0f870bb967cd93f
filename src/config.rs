//! Runtime configuration: JSON file defaults, overridden by the command line.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MetricsError, Result};

pub const CONFIG_ENV: &str = "CMD_METRICS_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Command-name prefixes to track (delta mode) or list
    pub commands: Vec<String>,
    /// Effective uids to list
    pub uids: Vec<u32>,
    /// Require both a command and a uid match instead of either
    pub uid_and_cmd: bool,
    /// Aggregate per command and report deltas
    pub delta: bool,
    /// Count TCP sockets per command (delta mode only)
    pub sockets: bool,
    /// One record per thread (listing mode only)
    pub threads: bool,
    /// Seconds between samples; 0 samples once
    pub interval_secs: u64,
    /// -1: heading once at start, 0: never, n: every n lines
    pub repeat_header: i64,
    pub output: OutputConfig,
    pub sources: SourcesConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Report file; stdout when unset
    pub path: Option<PathBuf>,
    /// One JSON object per interval instead of columns
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub proc_root: PathBuf,
    pub tcp: Option<PathBuf>,
    pub tcp6: Option<PathBuf>,
    pub include_tcp6: bool,
    /// Initial size of the socket table read buffer
    pub read_buffer_bytes: usize,
    /// Initial size of the socket index arena
    pub arena_initial_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            uids: Vec::new(),
            uid_and_cmd: false,
            delta: false,
            sockets: false,
            threads: false,
            interval_secs: 0,
            repeat_header: -1,
            output: OutputConfig::default(),
            sources: SourcesConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            json: false,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            tcp: None,
            tcp6: None,
            include_tcp6: true,
            read_buffer_bytes: 1024 * 1024,
            arena_initial_bytes: 256 * 1024,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

impl MetricsConfig {
    /// `$CMD_METRICS_CONFIG`, else `<config dir>/cmd-metrics/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(p) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(p));
        }
        dirs::config_dir().map(|d| d.join("cmd-metrics").join("config.json"))
    }

    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<MetricsConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.delta && self.commands.is_empty() {
            return Err(MetricsError::config(
                "delta mode needs one or more commands (-c)",
            ));
        }
        if self.delta && self.threads {
            return Err(MetricsError::config(
                "thread records (-t) are not supported in delta mode (-d)",
            ));
        }
        if self.sockets && !self.delta {
            return Err(MetricsError::config(
                "socket counting (-s) is only supported in delta mode (-d)",
            ));
        }
        if self.repeat_header < -1 {
            return Err(MetricsError::config(
                "repeat-header (-r) must be -1, 0 or a positive integer",
            ));
        }
        if self.commands.iter().any(|c| c.is_empty()) {
            return Err(MetricsError::config("command names (-c) must not be empty"));
        }
        Ok(())
    }
}
