//! Kernel state collectors: process records, the TCP socket index and the
//! process→socket correlation. Shared record types live here.

mod correlate;
mod process;
mod sockets;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::arena::Arena;
use crate::config::MetricsConfig;
use crate::error::Result;
use crate::filter::RecordFilter;
use crate::metrics::CommandMetrics;

pub use correlate::{comm_matches, gather_command_sockets, parse_socket_link, read_comm};
pub use process::{page_size, ticks_per_second, ProcessCollector};
pub use sockets::{inode_hash, parse_socket_line, SocketIndex, SocketSource, TableReader, TABLE_SIZE};

/// One live process or thread at sampling time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSample {
    pub command: String,
    pub pid: i32,
    pub ppid: i32,
    pub tgid: i32,
    pub euid: u32,
    pub euser: String,
    /// Virtual size in bytes
    pub vsz: u64,
    /// Resident size in bytes
    pub rss: u64,
    pub utime: u64,
    pub stime: u64,
}

/// Kernel TCP state codes as they appear in `/proc/net/tcp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TcpState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    NewSynRecv,
    Unknown(u8),
}

impl TcpState {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => TcpState::Established,
            0x02 => TcpState::SynSent,
            0x03 => TcpState::SynRecv,
            0x04 => TcpState::FinWait1,
            0x05 => TcpState::FinWait2,
            0x06 => TcpState::TimeWait,
            0x07 => TcpState::Close,
            0x08 => TcpState::CloseWait,
            0x09 => TcpState::LastAck,
            0x0A => TcpState::Listen,
            0x0B => TcpState::Closing,
            0x0C => TcpState::NewSynRecv,
            other => TcpState::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            TcpState::Established => 0x01,
            TcpState::SynSent => 0x02,
            TcpState::SynRecv => 0x03,
            TcpState::FinWait1 => 0x04,
            TcpState::FinWait2 => 0x05,
            TcpState::TimeWait => 0x06,
            TcpState::Close => 0x07,
            TcpState::CloseWait => 0x08,
            TcpState::LastAck => 0x09,
            TcpState::Listen => 0x0A,
            TcpState::Closing => 0x0B,
            TcpState::NewSynRecv => 0x0C,
            TcpState::Unknown(code) => *code,
        }
    }
}

/// One kernel socket table entry. Only meaningful within the snapshot it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketRecord {
    pub inode: u64,
    pub uid: u32,
    pub local: SocketAddr,
    pub remote: SocketAddr,
    pub state: TcpState,
}

/// Socket counts for one command.
///
/// `rest` is kept equal to `total - established - close_wait - listener`
/// by [`SocketAggregate::record`]; sockets without an index entry land there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketAggregate {
    pub total: u64,
    pub established: u64,
    pub close_wait: u64,
    pub listener: u64,
    pub rest: u64,
}

impl SocketAggregate {
    /// Counts one open socket, classified by its index entry if it has one.
    pub fn record(&mut self, state: Option<TcpState>) {
        self.total += 1;
        match state {
            Some(TcpState::Established) => self.established += 1,
            Some(TcpState::CloseWait) => self.close_wait += 1,
            Some(TcpState::Listen) => self.listener += 1,
            _ => {}
        }
        self.rest = self.total - (self.established + self.close_wait + self.listener);
    }
}

/// Where kernel state is read from. Overridable for fixtures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcRoots {
    pub proc_root: PathBuf,
    pub tcp: PathBuf,
    pub tcp6: Option<PathBuf>,
}

impl ProcRoots {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        let proc_root = proc_root.into();
        Self {
            tcp: proc_root.join("net").join("tcp"),
            tcp6: Some(proc_root.join("net").join("tcp6")),
            proc_root,
        }
    }

    /// Honors `PROC_ROOT`, `PROC_TCP` and `PROC_TCP6`; config values are the fallback.
    pub fn from_env(config: &MetricsConfig) -> Self {
        let root = std::env::var_os("PROC_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| config.sources.proc_root.clone());
        let mut roots = Self::new(root);
        if let Some(tcp) = std::env::var_os("PROC_TCP") {
            roots.tcp = PathBuf::from(tcp);
        } else if let Some(tcp) = &config.sources.tcp {
            roots.tcp = tcp.clone();
        }
        if !config.sources.include_tcp6 {
            roots.tcp6 = None;
        } else if let Some(tcp6) = std::env::var_os("PROC_TCP6") {
            roots.tcp6 = Some(PathBuf::from(tcp6));
        } else if let Some(tcp6) = &config.sources.tcp6 {
            roots.tcp6 = Some(tcp6.clone());
        }
        roots
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }
}

/// Process records of one interval, optionally with per-command socket aggregates.
#[derive(Debug, Default)]
pub struct IntervalSample {
    pub processes: Vec<ProcessSample>,
    pub sockets: Option<Vec<SocketAggregate>>,
    pub indexed_sockets: usize,
}

/// Runs the per-interval collection: enumerate, index sockets, correlate.
pub struct Sampler {
    pub roots: ProcRoots,
    pub filter: RecordFilter,
    pub include_threads: bool,
    pub include_sockets: bool,
    processes: ProcessCollector,
    sockets: SocketSource,
    arena: Arena,
}

impl Sampler {
    pub fn new(config: &MetricsConfig, roots: ProcRoots) -> Result<Self> {
        Ok(Self {
            filter: RecordFilter::from_config(config),
            include_threads: config.threads,
            include_sockets: config.sockets,
            processes: ProcessCollector::new(roots.proc_root.clone()),
            sockets: SocketSource::new(&roots, config.sources.read_buffer_bytes),
            arena: Arena::new(config.sources.arena_initial_bytes)?,
            roots,
        })
    }

    /// Enumerates process records that pass the filter.
    pub fn collect_processes(&self) -> Result<Vec<ProcessSample>> {
        let mut all = self.processes.snapshot(self.include_threads)?;
        all.retain(|p| self.filter.includes(&p.command, p.euid));
        Ok(all)
    }

    /// Builds a fresh socket index and computes one aggregate per tracked command,
    /// in the order of `commands`. The index is discarded before returning.
    pub fn collect_sockets(&mut self, commands: &[String]) -> Result<(Vec<SocketAggregate>, usize)> {
        let index = self.sockets.build_index(&mut self.arena)?;
        let indexed = index.len();
        let mut out = Vec::with_capacity(commands.len());
        for cmd in commands {
            out.push(gather_command_sockets(&index, self.roots.proc_root(), cmd)?);
        }
        debug!(
            indexed,
            growths = index.arena_growths(),
            "socket index built"
        );
        Ok((out, indexed))
    }

    /// One delta-mode cycle: rotate, correlate sockets, fold process records.
    pub fn run_delta_cycle(&mut self, metrics: &mut CommandMetrics) -> Result<IntervalSample> {
        let processes = self.collect_processes()?;
        metrics.begin_interval();

        let mut sample = IntervalSample::default();
        if self.include_sockets {
            let commands: Vec<String> = metrics.commands().map(String::from).collect();
            let (aggregates, indexed) = self.collect_sockets(&commands)?;
            for (cmd, agg) in commands.iter().zip(&aggregates) {
                metrics.apply_socket_aggregate(cmd, *agg);
            }
            sample.sockets = Some(aggregates);
            sample.indexed_sockets = indexed;
        }

        for p in &processes {
            metrics.accumulate(p);
        }
        debug!(records = processes.len(), "interval aggregated");
        sample.processes = processes;
        Ok(sample)
    }
}
