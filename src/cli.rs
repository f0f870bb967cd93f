use clap::Parser;
use std::path::PathBuf;

use crate::config::MetricsConfig;

#[derive(Parser, Debug, Default)]
#[command(name = "cmd-metrics")]
#[command(version, about = "Aggregate VSZ, RSS, CPU and TCP sockets per command", long_about = None)]
#[command(after_help = "EXAMPLES:
    # per-command totals and deltas every 5 seconds
    cmd-metrics -d -c nginx -c cache-main -i 5

    # same, with socket counts, heading every 20 lines
    cmd-metrics -d -s -c nginx -c cache-main -i 5 -r 20

    # list processes of uid 992 or 994
    cmd-metrics -u 992 -u 994

SIGNALS:
    SIGHUP           reopen the output file (log rotation)
    SIGINT, SIGTERM  flush and stop")]
pub struct Cli {
    /// Command name to track or list; matches every name starting with it
    #[arg(short = 'c', long = "command", value_name = "CMD")]
    pub commands: Vec<String>,

    /// Effective uid to list
    #[arg(short = 'u', long = "uid", value_name = "UID")]
    pub uids: Vec<u32>,

    /// Require both command and uid to match
    #[arg(short = 'a', long = "and")]
    pub uid_and_cmd: bool,

    /// Delta mode: per-command totals and changes per interval
    #[arg(short, long)]
    pub delta: bool,

    /// Count TCP sockets per command (delta mode)
    #[arg(short, long)]
    pub sockets: bool,

    /// Include thread records (listing mode)
    #[arg(short, long)]
    pub threads: bool,

    /// Interval in seconds
    #[arg(short, long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Heading cadence: -1 once, 0 never, n every n lines
    #[arg(short = 'r', long = "repeat-header", value_name = "N", allow_hyphen_values = true)]
    pub repeat_header: Option<i64>,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// One JSON object per interval
    #[arg(long)]
    pub json: bool,

    /// Log level for diagnostics on stderr (RUST_LOG wins)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Configuration file
    #[arg(long, value_name = "PATH", env = "CMD_METRICS_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Command-line values take precedence over the file.
    pub fn apply(self, mut config: MetricsConfig) -> MetricsConfig {
        if !self.commands.is_empty() {
            config.commands = self.commands;
        }
        if !self.uids.is_empty() {
            config.uids = self.uids;
        }
        config.uid_and_cmd |= self.uid_and_cmd;
        config.delta |= self.delta;
        config.sockets |= self.sockets;
        config.threads |= self.threads;
        config.output.json |= self.json;
        if let Some(i) = self.interval {
            config.interval_secs = i;
        }
        if let Some(r) = self.repeat_header {
            config.repeat_header = r;
        }
        if let Some(o) = self.output {
            config.output.path = Some(o);
        }
        if let Some(l) = self.log_level {
            config.log.level = l;
        }
        config
    }
}
