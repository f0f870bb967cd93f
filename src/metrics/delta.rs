//! Interval deltas for one tracked command.

use serde::{Deserialize, Serialize};

use super::CommandEntry;
use crate::collectors::SocketAggregate;

/// What one command contributes to an output line.
///
/// CPU is shown cumulatively (`utime_secs`, `stime_secs`). The per-interval CPU
/// figures are clamped at zero: when an instance exits during the interval its
/// ticks are in `previous` but not in `current`, and the raw difference would
/// go negative. The clamp under-reports CPU for that interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDelta {
    pub command: String,
    pub process_count: u32,
    pub vsz: u64,
    pub delta_vsz: i64,
    pub rss: u64,
    pub delta_rss: i64,
    pub utime_secs: f64,
    pub stime_secs: f64,
    pub utime_interval_secs: f64,
    pub stime_interval_secs: f64,
    pub sockets: SocketAggregate,
    pub delta_sockets: i64,
}

fn signed_diff(current: u64, previous: u64) -> i64 {
    current as i64 - previous as i64
}

/// `(current - previous) / ticks_per_sec`, or 0 when ticks went backwards.
pub fn interval_secs(current: u64, previous: u64, ticks_per_sec: u64) -> f64 {
    if previous >= current || ticks_per_sec == 0 {
        0.0
    } else {
        (current - previous) as f64 / ticks_per_sec as f64
    }
}

fn secs(ticks: u64, ticks_per_sec: u64) -> f64 {
    if ticks_per_sec == 0 {
        0.0
    } else {
        ticks as f64 / ticks_per_sec as f64
    }
}

impl CommandDelta {
    pub(super) fn from_entry(e: &CommandEntry, ticks_per_sec: u64, first_interval: bool) -> Self {
        let cur = &e.current;
        let prev = &e.previous;
        let mut d = CommandDelta {
            command: e.command.clone(),
            process_count: cur.process_count,
            vsz: cur.vsz,
            delta_vsz: 0,
            rss: cur.rss,
            delta_rss: 0,
            utime_secs: secs(cur.utime, ticks_per_sec),
            stime_secs: secs(cur.stime, ticks_per_sec),
            utime_interval_secs: 0.0,
            stime_interval_secs: 0.0,
            sockets: cur.sockets,
            delta_sockets: 0,
        };
        if !first_interval {
            d.delta_vsz = signed_diff(cur.vsz, prev.vsz);
            d.delta_rss = signed_diff(cur.rss, prev.rss);
            d.delta_sockets = signed_diff(cur.sockets.total, prev.sockets.total);
            d.utime_interval_secs = interval_secs(cur.utime, prev.utime, ticks_per_sec);
            d.stime_interval_secs = interval_secs(cur.stime, prev.stime, ticks_per_sec);
        }
        d
    }
}
