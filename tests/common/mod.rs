//! Synthetic process-info roots for tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const TCP_HEADER: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode";

pub struct ProcFixture {
    dir: TempDir,
}

pub struct Proc<'a> {
    pub pid: i32,
    pub comm: &'a str,
    pub uid: u32,
    pub vsz: u64,
    pub rss_pages: u64,
    pub utime: u64,
    pub stime: u64,
}

impl<'a> Proc<'a> {
    pub fn new(pid: i32, comm: &'a str) -> Self {
        Self {
            pid,
            comm,
            uid: 1000,
            vsz: 0,
            rss_pages: 0,
            utime: 0,
            stime: 0,
        }
    }
}

fn stat_line(pid: i32, p: &Proc<'_>) -> String {
    format!(
        "{} ({}) S 1 {} {} 0 -1 4194560 100 0 0 0 {} {} 0 0 20 0 1 0 1000 {} {} 18446744073709551615\n",
        pid, p.comm, pid, pid, p.utime, p.stime, p.vsz, p.rss_pages
    )
}

fn status_text(tgid: i32, pid: i32, p: &Proc<'_>) -> String {
    format!(
        "Name:\t{}\nTgid:\t{}\nPid:\t{}\nUid:\t{}\t{}\t{}\t{}\n",
        p.comm, tgid, pid, p.uid, p.uid, p.uid, p.uid
    )
}

impl ProcFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("net")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn tcp_path(&self) -> PathBuf {
        self.root().join("net").join("tcp")
    }

    pub fn add_process(&self, p: &Proc<'_>) {
        let dir = self.root().join(p.pid.to_string());
        fs::create_dir_all(dir.join("fd")).unwrap();
        fs::write(dir.join("stat"), stat_line(p.pid, p)).unwrap();
        fs::write(dir.join("status"), status_text(p.pid, p.pid, p)).unwrap();
    }

    pub fn add_thread(&self, p: &Proc<'_>, tid: i32) {
        let dir = self.root().join(p.pid.to_string()).join("task").join(tid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stat"), stat_line(tid, p)).unwrap();
        fs::write(dir.join("status"), status_text(p.pid, tid, p)).unwrap();
    }

    pub fn add_fd(&self, pid: i32, fd: u32, target: &str) {
        let link = self.root().join(pid.to_string()).join("fd").join(fd.to_string());
        std::os::unix::fs::symlink(target, link).unwrap();
    }

    pub fn add_socket_fd(&self, pid: i32, fd: u32, inode: u64) {
        self.add_fd(pid, fd, &format!("socket:[{}]", inode));
    }

    pub fn write_tcp(&self, lines: &[String]) {
        let mut text = String::from(TCP_HEADER);
        text.push('\n');
        for l in lines {
            text.push_str(l);
            text.push('\n');
        }
        fs::write(self.tcp_path(), text).unwrap();
    }

    pub fn tcp6_path(&self) -> PathBuf {
        self.root().join("net").join("tcp6")
    }

    pub fn write_tcp6(&self, lines: &[String]) {
        let mut text = String::from(TCP_HEADER);
        text.push('\n');
        for l in lines {
            text.push_str(l);
            text.push('\n');
        }
        fs::write(self.tcp6_path(), text).unwrap();
    }
}

/// One `/proc/net/tcp` data line.
pub fn tcp_line(sl: usize, state: u8, uid: u32, inode: u64) -> String {
    format!(
        "{:>4}: 0100007F:1F90 0100007F:{:04X} {:02X} 00000000:00000000 00:00000000 00000000 {:>5}        0 {} 1 0000000000000000 20 4 30 10 -1",
        sl,
        40000 + sl,
        state,
        uid,
        inode
    )
}

/// One `/proc/net/tcp6` data line, bound to `[::1]:8080`.
pub fn tcp6_line(sl: usize, state: u8, uid: u32, inode: u64) -> String {
    format!(
        "{:>4}: 00000000000000000000000001000000:1F90 00000000000000000000000001000000:{:04X} {:02X} 00000000:00000000 00:00000000 00000000 {:>5}        0 {} 1 0000000000000000 20 4 30 10 -1",
        sl,
        40000 + sl,
        state,
        uid,
        inode
    )
}
