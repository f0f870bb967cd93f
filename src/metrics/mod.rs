//! Per-command aggregation of process records and socket counts, with
//! current/previous samples for interval deltas.

mod delta;

use serde::{Deserialize, Serialize};

use crate::collectors::{ProcessSample, SocketAggregate};
use crate::error::{MetricsError, Result};

pub use delta::{interval_secs, CommandDelta};

/// Totals for one command over all its running instances, for one interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetricSample {
    pub process_count: u32,
    pub vsz: u64,
    pub rss: u64,
    pub utime: u64,
    pub stime: u64,
    pub sockets: SocketAggregate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub command: String,
    pub current: CommandMetricSample,
    pub previous: CommandMetricSample,
}

/// The tracked-command table, owned by the sampling driver for its lifetime.
#[derive(Debug, Clone)]
pub struct CommandMetrics {
    entries: Vec<CommandEntry>,
    intervals: u64,
}

impl CommandMetrics {
    pub fn new(commands: &[String]) -> Result<Self> {
        if commands.is_empty() {
            return Err(MetricsError::config(
                "one or more commands must be given in delta mode",
            ));
        }
        Ok(Self {
            entries: commands
                .iter()
                .map(|c| CommandEntry {
                    command: c.clone(),
                    current: CommandMetricSample::default(),
                    previous: CommandMetricSample::default(),
                })
                .collect(),
            intervals: 0,
        })
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.command.as_str())
    }

    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    /// Intervals started so far.
    pub fn intervals(&self) -> u64 {
        self.intervals
    }

    /// True until a second interval has begun; there is no `previous` to diff against.
    pub fn is_first_interval(&self) -> bool {
        self.intervals <= 1
    }

    /// Rotates `current` into `previous` and zeroes `current`. Call exactly once
    /// per interval, before any accumulation.
    pub fn begin_interval(&mut self) {
        self.intervals += 1;
        for e in &mut self.entries {
            e.previous = e.current;
            e.current = CommandMetricSample::default();
        }
    }

    /// Adds a record to every tracked command that is a prefix of its name.
    pub fn accumulate(&mut self, sample: &ProcessSample) {
        for e in &mut self.entries {
            if sample.command.starts_with(e.command.as_str()) {
                let cur = &mut e.current;
                cur.process_count += 1;
                cur.vsz += sample.vsz;
                cur.rss += sample.rss;
                cur.utime += sample.utime;
                cur.stime += sample.stime;
            }
        }
    }

    /// Replaces the socket counts of `command`; aggregates are absolute, not increments.
    pub fn apply_socket_aggregate(&mut self, command: &str, aggregate: SocketAggregate) -> bool {
        let mut found = false;
        for e in self.entries.iter_mut().filter(|e| e.command == command) {
            e.current.sockets = aggregate;
            found = true;
        }
        found
    }

    pub fn compute_deltas(&self, ticks_per_sec: u64) -> Vec<CommandDelta> {
        let first = self.is_first_interval();
        self.entries
            .iter()
            .map(|e| CommandDelta::from_entry(e, ticks_per_sec, first))
            .collect()
    }
}
