//! Process enumerator over `/proc/<pid>/stat` and `/proc/<pid>/status`,
//! optionally expanded to one record per thread from `/proc/<pid>/task`.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

use super::ProcessSample;
use crate::error::{MetricsError, Result};

/// Scheduler ticks per second (`_SC_CLK_TCK`).
pub fn ticks_per_second() -> u64 {
    #[cfg(unix)]
    {
        let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if tck > 0 {
            return tck as u64;
        }
    }
    100
}

pub fn page_size() -> u64 {
    #[cfg(unix)]
    {
        let ps = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if ps > 0 {
            return ps as u64;
        }
    }
    4096
}

struct StatFields {
    command: String,
    ppid: i32,
    utime: u64,
    stime: u64,
    vsize: u64,
    rss_pages: u64,
}

fn parse_stat(raw: &str) -> Option<StatFields> {
    let open = raw.find('(')?;
    let close = raw.rfind(')')?;
    let command = raw.get(open + 1..close)?.to_string();
    // fields after the comm start at field 3 (state)
    let rest: Vec<&str> = raw.get(close + 1..)?.split_whitespace().collect();
    if rest.len() < 22 {
        return None;
    }
    Some(StatFields {
        command,
        ppid: rest[1].parse().ok()?,
        utime: rest[11].parse().ok()?,
        stime: rest[12].parse().ok()?,
        vsize: rest[20].parse().ok()?,
        rss_pages: rest[21].parse().ok()?,
    })
}

/// `(tgid, effective uid)` from a status file.
fn parse_status(raw: &str) -> Option<(i32, u32)> {
    let mut tgid = None;
    let mut euid = None;
    for line in raw.lines() {
        if let Some(v) = line.strip_prefix("Tgid:") {
            tgid = v.trim().parse().ok();
        } else if let Some(v) = line.strip_prefix("Uid:") {
            euid = v.split_whitespace().nth(1).and_then(|s| s.parse().ok());
        }
    }
    Some((tgid?, euid?))
}

fn numeric_name(entry: &walkdir::DirEntry) -> Option<i32> {
    entry.file_name().to_str()?.parse().ok()
}

pub struct ProcessCollector {
    proc_root: PathBuf,
    users: HashMap<u32, String>,
    page_size: u64,
}

impl ProcessCollector {
    pub fn new(proc_root: PathBuf) -> Self {
        let users = sysinfo::Users::new_with_refreshed_list()
            .list()
            .iter()
            .map(|u| (**u.id(), u.name().to_string()))
            .collect();
        Self {
            proc_root,
            users,
            page_size: page_size(),
        }
    }

    pub fn user_name(&self, uid: u32) -> String {
        self.users
            .get(&uid)
            .cloned()
            .unwrap_or_else(|| uid.to_string())
    }

    fn read_record(&self, dir: &Path, pid: i32) -> Option<ProcessSample> {
        let stat = parse_stat(&std::fs::read_to_string(dir.join("stat")).ok()?)?;
        let (tgid, euid) = parse_status(&std::fs::read_to_string(dir.join("status")).ok()?)?;
        Some(ProcessSample {
            command: stat.command,
            pid,
            ppid: stat.ppid,
            tgid,
            euid,
            euser: self.user_name(euid),
            vsz: stat.vsize,
            rss: stat.rss_pages * self.page_size,
            utime: stat.utime,
            stime: stat.stime,
        })
    }

    /// One record per live process, or per thread when `include_threads` is set.
    /// Entries that disappear while being read are skipped.
    pub fn snapshot(&self, include_threads: bool) -> Result<Vec<ProcessSample>> {
        let mut out = Vec::new();
        for entry in WalkDir::new(&self.proc_root).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(MetricsError::ProcRoot {
                        path: self.proc_root.clone(),
                        source: io::Error::from(e),
                    })
                }
                Err(_) => continue,
            };
            let Some(pid) = numeric_name(&entry) else {
                continue;
            };
            if !include_threads {
                match self.read_record(entry.path(), pid) {
                    Some(rec) => out.push(rec),
                    None => trace!(pid, "process vanished during enumeration"),
                }
                continue;
            }
            for task in WalkDir::new(entry.path().join("task"))
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if let Some(tid) = numeric_name(&task) {
                    if let Some(rec) = self.read_record(task.path(), tid) {
                        out.push(rec);
                    }
                }
            }
        }
        Ok(out)
    }
}
