//! Resolves a command's open sockets by walking `/proc/<pid>/fd` and looking
//! each `socket:[<inode>]` link up in the socket index.

use std::io;
use std::path::Path;
use tracing::trace;
use walkdir::WalkDir;

use super::{SocketAggregate, SocketIndex};
use crate::error::{MetricsError, Result};

/// Longest comm the kernel reports (TASK_COMM_LEN - 1); longer names are cut.
pub const COMM_MAX: usize = 15;

const SOCKET_PREFIX: &str = "socket:[";

/// Command name from `/proc/<pid>/stat`, the text between the first `(` and the last `)`.
pub fn read_comm(stat_path: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(stat_path).ok()?;
    let open = raw.find('(')?;
    let close = raw.rfind(')')?;
    if close <= open {
        return None;
    }
    Some(raw[open + 1..close].to_string())
}

/// True when `comm` belongs to the command named by `filter`.
///
/// The filter is a prefix of the observed name. When the kernel cut the name at
/// [`COMM_MAX`] characters, a longer filter still matches if it starts with the
/// truncated name.
pub fn comm_matches(filter: &str, comm: &str) -> bool {
    if filter.is_empty() || comm.is_empty() {
        return false;
    }
    comm.starts_with(filter) || (comm.len() == COMM_MAX && filter.starts_with(comm))
}

/// Inode of a `socket:[<inode>]` link target.
pub fn parse_socket_link(target: &Path) -> Option<u64> {
    target
        .to_str()?
        .strip_prefix(SOCKET_PREFIX)?
        .strip_suffix(']')?
        .parse()
        .ok()
}

fn numeric_name(entry: &walkdir::DirEntry) -> Option<i32> {
    entry.file_name().to_str()?.parse().ok()
}

/// Counts the open sockets of every process whose comm matches `command`.
///
/// Processes and descriptors that vanish mid-scan, and fd directories we may
/// not read, are skipped. Only an unreadable process-info root is an error.
pub fn gather_command_sockets(
    index: &SocketIndex<'_>,
    proc_root: &Path,
    command: &str,
) -> Result<SocketAggregate> {
    let mut agg = SocketAggregate::default();

    for entry in WalkDir::new(proc_root).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(MetricsError::ProcRoot {
                    path: proc_root.to_path_buf(),
                    source: io::Error::from(e),
                })
            }
            Err(e) => {
                trace!(error = %e, "skipping process entry");
                continue;
            }
        };
        let Some(pid) = numeric_name(&entry) else {
            continue;
        };
        let Some(comm) = read_comm(&entry.path().join("stat")) else {
            trace!(pid, "process vanished before its comm was read");
            continue;
        };
        if !comm_matches(command, &comm) {
            continue;
        }

        let fd_dir = entry.path().join("fd");
        for fd in WalkDir::new(&fd_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if numeric_name(&fd).is_none() || !fd.path_is_symlink() {
                continue;
            }
            let Ok(target) = std::fs::read_link(fd.path()) else {
                continue;
            };
            let Some(inode) = parse_socket_link(&target) else {
                continue;
            };
            agg.record(index.find(inode).map(|rec| rec.state));
        }
    }
    Ok(agg)
}
