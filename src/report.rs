//! Output lines: one delta line per interval (with periodic headings), or a
//! flat process listing.

use serde::Serialize;
use std::io::{self, Write};

use crate::collectors::ProcessSample;
use crate::logging::StructuredLogger;
use crate::metrics::CommandDelta;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const BLOCK_WIDTH: usize = 73;
const SOCKET_BLOCK_WIDTH: usize = 109;

pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Serialize)]
struct IntervalLine<'a> {
    ts: &'a str,
    commands: &'a [CommandDelta],
}

/// Writes delta lines and decides when the two heading lines are due.
pub struct DeltaReport {
    include_sockets: bool,
    repeat_header: i64,
    json: bool,
    lines: u64,
}

impl DeltaReport {
    pub fn new(include_sockets: bool, repeat_header: i64, json: bool) -> Self {
        Self {
            include_sockets,
            repeat_header,
            json,
            lines: 0,
        }
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    pub fn heading_due(&self) -> bool {
        match self.repeat_header {
            -1 => self.lines == 0,
            n if n > 0 => self.lines % n as u64 == 0,
            _ => false,
        }
    }

    pub fn write_heading(&self, w: &mut impl Write, commands: &[CommandDelta]) -> io::Result<()> {
        let width = if self.include_sockets {
            SOCKET_BLOCK_WIDTH
        } else {
            BLOCK_WIDTH
        };
        write!(w, "{:14}", "")?;
        for c in commands {
            write!(w, "|{:<width$}", c.command, width = width)?;
        }
        writeln!(w)?;

        write!(w, "{:<14}", "datetime")?;
        for _ in commands {
            write!(
                w,
                "|{:>5}  {:>11}  {:>9}  {:>11}  {:>9}  {:>8}  {:>8}",
                "procs", "vsz", "delta-vsz", "rss", "delta-rss", "utime", "stime"
            )?;
            if self.include_sockets {
                write!(
                    w,
                    " {:>5} {:>5} {:>5} {:>5} {:>5} {:>5}",
                    "socks", "dsock", "estab", "cl_wt", "listn", "rest"
                )?;
            }
        }
        writeln!(w)
    }

    pub fn format_line(&self, timestamp: &str, deltas: &[CommandDelta]) -> String {
        let mut line = format!("{:>14}", timestamp);
        for d in deltas {
            line.push_str(&format!(
                "|{:>5}  {:>11}  {:>9}  {:>11}  {:>9}  {:>8.2}  {:>8.2}",
                d.process_count, d.vsz, d.delta_vsz, d.rss, d.delta_rss, d.utime_secs, d.stime_secs
            ));
            if self.include_sockets {
                let s = &d.sockets;
                line.push_str(&format!(
                    " {:>5} {:>5} {:>5} {:>5} {:>5} {:>5}",
                    s.total, d.delta_sockets, s.established, s.close_wait, s.listener, s.rest
                ));
            }
        }
        line
    }

    /// Writes one interval, preceded by the headings when they are due.
    pub fn write_interval(
        &mut self,
        w: &mut impl Write,
        timestamp: &str,
        deltas: &[CommandDelta],
    ) -> io::Result<()> {
        if self.json {
            StructuredLogger::emit_json(
                &IntervalLine {
                    ts: timestamp,
                    commands: deltas,
                },
                w,
            )?;
        } else {
            if self.heading_due() {
                self.write_heading(w, deltas)?;
            }
            writeln!(w, "{}", self.format_line(timestamp, deltas))?;
        }
        self.lines += 1;
        Ok(())
    }
}

/// Flat listing of process records, heading on the first write only.
pub struct ProcessListing {
    threads: bool,
    heading_done: bool,
}

impl ProcessListing {
    pub fn new(threads: bool) -> Self {
        Self {
            threads,
            heading_done: false,
        }
    }

    pub fn write(&mut self, w: &mut impl Write, records: &[ProcessSample]) -> io::Result<()> {
        if !self.heading_done {
            if self.threads {
                writeln!(
                    w,
                    "{:<15} {:>7} {:>7} {:>7} {:>5} {:<10} {:>12} {:>12} {:>9} {:>9}",
                    "command", "pid", "ppid", "tgid", "euid", "euser", "vsz", "rss", "utime", "stime"
                )?;
            } else {
                writeln!(
                    w,
                    "{:<15} {:>7} {:>7} {:>5} {:<10} {:>12} {:>12} {:>9} {:>9}",
                    "command", "pid", "ppid", "euid", "euser", "vsz", "rss", "utime", "stime"
                )?;
            }
            self.heading_done = true;
        }
        for p in records {
            if self.threads {
                writeln!(
                    w,
                    "{:<15} {:>7} {:>7} {:>7} {:>5} {:<10} {:>12} {:>12} {:>9} {:>9}",
                    p.command, p.pid, p.ppid, p.tgid, p.euid, p.euser, p.vsz, p.rss, p.utime, p.stime
                )?;
            } else {
                writeln!(
                    w,
                    "{:<15} {:>7} {:>7} {:>5} {:<10} {:>12} {:>12} {:>9} {:>9}",
                    p.command, p.pid, p.ppid, p.euid, p.euser, p.vsz, p.rss, p.utime, p.stime
                )?;
            }
        }
        Ok(())
    }
}
